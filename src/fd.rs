use crate::bus_types::bus_types;
use crate::cmplx;
use crate::error::{PowerFlowError, Result};
use crate::math::power_injection;
use crate::network::Network;
use crate::solver::{power_mismatch, PowerFlowStep, StepData, StepOutput};
use crate::traits::LinearSolver;

use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;
use sparsetools::csr::{CCSR, CSR};
use std::iter::zip;

/// Builds the two matrices B prime and B double prime used in the fast
/// decoupled power flow (XB version).
///
/// B prime is formed from the branch series reactances only, ignoring
/// shunts, taps and resistance. B double prime is the negated bus
/// susceptance matrix. A branch without series reactance has no
/// B prime entry and is rejected.
pub fn make_b(net: &Network) -> anyhow::Result<(CSR<usize, f64>, CSR<usize, f64>)> {
    let (nl, nb) = (net.branch.len(), net.len());

    // Bf * Va gives the flow on each branch, Cft = Cf - Ct.
    let mut b_f = Coo::with_size(nl, nb);
    let mut c_ft = Coo::with_size(nl, nb);
    for (l, br) in net.branch.iter().enumerate() {
        let x = br.z.im;
        if x == 0.0 {
            return Err(PowerFlowError::ZeroReactance {
                from: br.from,
                to: br.to,
            }
            .into());
        }
        let b = 1.0 / x;
        b_f.push(l, br.from, b);
        b_f.push(l, br.to, -b);

        c_ft.push(l, br.from, 1.0);
        c_ft.push(l, br.to, -1.0);
    }
    let b_f = b_f.to_csr();
    let c_ft = c_ft.to_csr();

    let b_p = (&c_ft.t() * &b_f).to_csr();

    // The products sum the duplicate entries of parallel branches.
    let b_pp = (&net.y_bus * CSR::with_diagonal(vec![cmplx!(-1.0); nb])).imag();

    Ok((b_p, b_pp))
}

/// Fast decoupled method. B prime and B double prime are reduced to the
/// PV+PQ and PQ buses once, when the strategy is built.
pub struct FastDecoupled {
    pq: Vec<usize>,
    pv_pq: Vec<usize>,

    s_bus: Vec<Complex64>,

    b_p: CSC<usize, f64>,
    b_pp: CSC<usize, f64>,
}

impl FastDecoupled {
    pub fn new(net: &Network) -> Result<Self> {
        let (_, pv, pq) = bus_types(&net.bus);
        let pv_pq = [pv.as_slice(), pq.as_slice()].concat();

        let (b_p, b_pp) = make_b(net)?;
        let b_p = b_p.select(Some(&pv_pq), Some(&pv_pq))?.to_csc();
        let b_pp = b_pp.select(Some(&pq), Some(&pq))?.to_csc();

        Ok(Self {
            pq,
            pv_pq,
            s_bus: net.bus.iter().map(|b| b.s_bus()).collect(),
            b_p,
            b_pp,
        })
    }

    /// `(V .* conj(Y * V) - Sbus) ./ Vm`
    fn scaled_mismatch(&self, v: &[Complex64], y_bus: &CSR<usize, Complex64>) -> Vec<Complex64> {
        let i_bus: Vec<Complex64> = y_bus * &v.to_vec();
        let s_calc = power_injection(v, &i_bus);
        zip(zip(s_calc, &self.s_bus), v)
            .map(|((s_calc, s_bus), v)| (s_calc - s_bus) / v.norm())
            .collect()
    }
}

impl PowerFlowStep for FastDecoupled {
    fn step(&mut self, net: &mut Network, lin_solver: &dyn LinearSolver) -> Result<StepOutput> {
        let mut va: Vec<f64> = net.v.iter().map(|v| v.arg()).collect();
        let mut vm: Vec<f64> = net.v.iter().map(|v| v.norm()).collect();

        // P iteration, update Va
        let mis = self.scaled_mismatch(&net.v, &net.y_bus);
        let mut d_va: Vec<f64> = self.pv_pq.iter().map(|&i| mis[i].re).collect();
        lin_solver
            .solve(&self.b_p, &mut d_va)
            .map_err(|err| PowerFlowError::LinearSolve(err.to_string()))?;
        d_va.iter_mut().for_each(|dx| *dx = -*dx);
        zip(&self.pv_pq, &d_va).for_each(|(&i, dx)| va[i] += dx);

        let mut v: Vec<Complex64> = zip(&vm, &va)
            .map(|(&vm, &va)| Complex64::from_polar(vm, va))
            .collect();

        // Q iteration, update Vm
        let mut d_vm = Vec::with_capacity(self.pq.len());
        if !self.pq.is_empty() {
            let mis = self.scaled_mismatch(&v, &net.y_bus);
            d_vm = self.pq.iter().map(|&i| mis[i].im).collect();
            lin_solver
                .solve(&self.b_pp, &mut d_vm)
                .map_err(|err| PowerFlowError::LinearSolve(err.to_string()))?;
            d_vm.iter_mut().for_each(|dx| *dx = -*dx);
            zip(&self.pq, &d_vm).for_each(|(&i, dx)| vm[i] += dx);

            v = zip(vm, va)
                .map(|(vm, va)| Complex64::from_polar(vm, va))
                .collect();
        }
        net.v = v;

        Ok(StepOutput {
            mismatch: power_mismatch(net, &self.s_bus, &self.pv_pq, &self.pq),
            data: StepData::Decoupled { d_va, d_vm },
        })
    }

    fn reactive_injection(&self, net: &Network, i: usize) -> f64 {
        net.calculated_apparent_power()[i].im
    }
}
