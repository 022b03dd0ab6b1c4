use crate::error::Result;
use crate::fd::FastDecoupled;
use crate::network::Network;
use crate::newton::CurrentInjection;
use crate::pfopt::Method;
use crate::traits::LinearSolver;

use num_complex::Complex64;
use sparsetools::csc::CSC;

/// Method specific data produced by one step.
pub enum StepData {
    /// Jacobian of the current balance equations used for the update.
    Jacobian(CSC<usize, f64>),
    /// Angle (PV and PQ buses) and magnitude (PQ buses) corrections.
    Decoupled { d_va: Vec<f64>, d_vm: Vec<f64> },
}

// `CSC` does not implement `Debug`, so the Jacobian is shown by its shape.
impl std::fmt::Debug for StepData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepData::Jacobian(jac) => f
                .debug_struct("Jacobian")
                .field("rows", &jac.rows())
                .field("cols", &jac.cols())
                .finish(),
            StepData::Decoupled { d_va, d_vm } => f
                .debug_struct("Decoupled")
                .field("d_va", d_va)
                .field("d_vm", d_vm)
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct StepOutput {
    /// Programmed minus calculated power: P of PV and PQ buses followed
    /// by Q of PQ buses.
    pub mismatch: Vec<f64>,
    pub data: StepData,
}

/// One iteration of a power flow method.
///
/// Implementations are built from the bus roles of a network and keep
/// whatever they derive from them (index lists, fixed matrices). Each
/// call to `step` updates the network voltages once.
pub trait PowerFlowStep {
    fn step(&mut self, net: &mut Network, lin_solver: &dyn LinearSolver) -> Result<StepOutput>;

    /// Present estimate of the reactive power injected at bus `i` (p.u.).
    fn reactive_injection(&self, net: &Network, i: usize) -> f64;
}

pub enum ActiveSolver {
    CurrentInjection(CurrentInjection),
    FastDecoupled(FastDecoupled),
}

impl ActiveSolver {
    pub fn new(method: Method, net: &Network) -> Result<Self> {
        Ok(match method {
            Method::CurrentInjection => ActiveSolver::CurrentInjection(CurrentInjection::new(net)),
            Method::FastDecoupled => ActiveSolver::FastDecoupled(FastDecoupled::new(net)?),
        })
    }
}

impl PowerFlowStep for ActiveSolver {
    fn step(&mut self, net: &mut Network, lin_solver: &dyn LinearSolver) -> Result<StepOutput> {
        match self {
            ActiveSolver::CurrentInjection(s) => s.step(net, lin_solver),
            ActiveSolver::FastDecoupled(s) => s.step(net, lin_solver),
        }
    }

    fn reactive_injection(&self, net: &Network, i: usize) -> f64 {
        match self {
            ActiveSolver::CurrentInjection(s) => s.reactive_injection(net, i),
            ActiveSolver::FastDecoupled(s) => s.reactive_injection(net, i),
        }
    }
}

/// Power mismatch `s_bus - V .* conj(Y * V)` reduced to the unknowns:
/// real part at `pv_pq`, imaginary part at `pq`.
pub(crate) fn power_mismatch(
    net: &Network,
    s_bus: &[Complex64],
    pv_pq: &[usize],
    pq: &[usize],
) -> Vec<f64> {
    let s_calc = net.calculated_apparent_power();

    let p = pv_pq.iter().map(|&i| (s_bus[i] - s_calc[i]).re);
    let q = pq.iter().map(|&i| (s_bus[i] - s_calc[i]).im);
    p.chain(q).collect()
}
