use crate::bus_types::bus_types;
use crate::error::{PowerFlowError, Result};
use crate::math::J;
use crate::network::Network;
use crate::solver::{power_mismatch, PowerFlowStep, StepData, StepOutput};
use crate::traits::LinearSolver;

use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;
use sparsetools::csr::{CCSR, CSR};
use std::iter::zip;

/// Newton's method on the nodal current balance, polar voltages.
///
/// Unknowns are the voltage angles of PV and PQ buses, the reactive
/// injection of PV buses and the voltage magnitudes of PQ buses. The
/// equations are the real and imaginary current mismatches
/// `Y * V - conj(S ./ V)` at PV and PQ buses.
pub struct CurrentInjection {
    pv: Vec<usize>,
    pq: Vec<usize>,
    pv_pq: Vec<usize>,

    /// Programmed injections, with the reactive part of PV buses
    /// replaced by the running estimate.
    s_bus: Vec<Complex64>,
}

/// Partial derivatives of the current mismatch `Y * V - conj(S ./ V)`
/// with respect to voltage angle and magnitude, for all buses.
fn d_imis_d_v(
    s_bus: &[Complex64],
    y_bus: &CSR<usize, Complex64>,
    v: &[Complex64],
) -> (CSR<usize, Complex64>, CSR<usize, Complex64>) {
    let v_norm = v.iter().map(|v| v / v.norm()).collect();
    let i_bus: Vec<Complex64> = zip(s_bus, v).map(|(s, v)| (s / v).conj()).collect();
    let i_bus_vm = zip(&i_bus, v).map(|(i, v)| i / v.norm()).collect();

    let diag_v = CSR::with_diagonal(v.to_vec());
    let diag_ibus = CSR::with_diagonal(i_bus);
    let diag_ibus_vm = CSR::with_diagonal(i_bus_vm);
    let diag_v_norm = CSR::with_diagonal(v_norm);

    let d_imis_d_va = J * (y_bus * diag_v - diag_ibus);
    let d_imis_d_vm = y_bus * diag_v_norm + diag_ibus_vm;

    (d_imis_d_va, d_imis_d_vm)
}

fn compose(j: [[&Coo<usize, f64>; 3]; 2]) -> anyhow::Result<Coo<usize, f64>> {
    let j1x = Coo::h_stack3(j[0][0], j[0][1], j[0][2])?;
    let j2x = Coo::h_stack3(j[1][0], j[1][1], j[1][2])?;
    Coo::v_stack(&j1x, &j2x)
}

impl CurrentInjection {
    pub fn new(net: &Network) -> Self {
        let (_, pv, pq) = bus_types(&net.bus);
        let pv_pq = [pv.as_slice(), pq.as_slice()].concat();

        let mut s_bus: Vec<Complex64> = net.bus.iter().map(|b| b.s_bus()).collect();
        let s_calc = net.calculated_apparent_power();
        pv.iter().for_each(|&i| s_bus[i].im = s_calc[i].im);

        Self {
            pv,
            pq,
            pv_pq,
            s_bus,
        }
    }

    /// Builds the Jacobian with columns ordered as
    /// `[Va(pv, pq), Q(pv), Vm(pq)]` and rows `[Re(pv, pq), Im(pv, pq)]`.
    fn jacobian(&self, net: &Network) -> anyhow::Result<CSC<usize, f64>> {
        let v = &net.v;
        let n = v.len();
        let (pv, pq, pv_pq) = (&self.pv, &self.pq, &self.pv_pq);

        let d_imis_d_q = Coo::new(
            n,
            n,
            pv.to_vec(),
            pv.to_vec(),
            pv.iter().map(|&i| J / v[i].conj()).collect(),
        )?
        .to_csr();
        let (d_imis_d_va, d_imis_d_vm) = d_imis_d_v(&self.s_bus, &net.y_bus, v);

        let j11 = d_imis_d_va.select(Some(pv_pq), Some(pv_pq))?.real();
        let j12 = d_imis_d_q.select(Some(pv_pq), Some(pv))?.real();
        let j13 = d_imis_d_vm.select(Some(pv_pq), Some(pq))?.real();
        let j21 = d_imis_d_va.select(Some(pv_pq), Some(pv_pq))?.imag();
        let j22 = d_imis_d_q.select(Some(pv_pq), Some(pv))?.imag();
        let j23 = d_imis_d_vm.select(Some(pv_pq), Some(pq))?.imag();

        Ok(compose([
            [&j11.to_coo(), &j12.to_coo(), &j13.to_coo()],
            [&j21.to_coo(), &j22.to_coo(), &j23.to_coo()],
        ])?
        .to_csc())
    }
}

impl PowerFlowStep for CurrentInjection {
    fn step(&mut self, net: &mut Network, lin_solver: &dyn LinearSolver) -> Result<StepOutput> {
        let n = self.pv_pq.len();
        let npv = self.pv.len();
        if n == 0 {
            return Ok(StepOutput {
                mismatch: Vec::new(),
                data: StepData::Jacobian(Coo::with_size(0, 0).to_csc()),
            });
        }

        // evaluate F(x)
        let i_bus: Vec<Complex64> = &net.y_bus * &net.v;
        let mis: Vec<Complex64> = zip(&net.v, zip(&i_bus, &self.s_bus))
            .map(|(v, (i_bus, s_bus))| i_bus - (s_bus / v).conj())
            .collect();
        let f: Vec<f64> = self
            .pv_pq
            .iter()
            .map(|&i| mis[i].re)
            .chain(self.pv_pq.iter().map(|&i| mis[i].im))
            .collect();

        // compute update step
        let jac = self.jacobian(net)?;
        let mut dx: Vec<f64> = f.iter().map(|f| -f).collect();
        lin_solver
            .solve(&jac, &mut dx)
            .map_err(|err| PowerFlowError::LinearSolve(err.to_string()))?;

        // update voltage
        let mut va: Vec<f64> = net.v.iter().map(|v| v.arg()).collect();
        let mut vm: Vec<f64> = net.v.iter().map(|v| v.norm()).collect();
        self.pv_pq
            .iter()
            .zip(&dx[..n])
            .for_each(|(&i, dx)| va[i] += dx);
        self.pv
            .iter()
            .zip(&dx[n..n + npv])
            .for_each(|(&i, dx)| self.s_bus[i].im += dx);
        self.pq
            .iter()
            .zip(&dx[n + npv..])
            .for_each(|(&i, dx)| vm[i] += dx);

        net.v = zip(vm, va)
            .map(|(vm, va)| Complex64::from_polar(vm, va))
            .collect();

        Ok(StepOutput {
            mismatch: power_mismatch(net, &self.s_bus, &self.pv_pq, &self.pq),
            data: StepData::Jacobian(jac),
        })
    }

    fn reactive_injection(&self, _net: &Network, i: usize) -> f64 {
        self.s_bus[i].im
    }
}
