use crate::debug::{format_polar_vec, format_rect_vec};
use crate::error::{PowerFlowError, Result};
use crate::math::norm_inf;
use crate::network::Network;
use crate::pfopt::{Method, PFOpt};
use crate::solver::{ActiveSolver, PowerFlowStep, StepData};
use crate::traits::LinearSolver;

use spsolve::rlu::RLU;

/// Record of one power flow iteration.
#[derive(Debug)]
pub struct Iteration {
    /// Iteration number, starting at 0.
    pub nit: usize,
    /// Maximum absolute P & Q mismatch (p.u.).
    pub max_err: f64,
    /// Mismatch of the step that triggered PV to PQ conversions, before
    /// the solver was rebuilt and stepped again. `None` when no bus was
    /// converted in this iteration.
    pub max_err_before_conversion: Option<f64>,
    pub data: StepData,
    /// PV buses switched to PQ during this iteration.
    pub converted: Vec<usize>,
    pub converged: bool,
}

enum Status {
    Running,
    Converged,
    Failing(PowerFlowError),
    Failed,
}

/// Lazy sequence of power flow iterations.
///
/// Each call to `next` runs one step of the selected method, enforces
/// generator reactive limits and checks convergence. Once converged the
/// slack and PV bus powers have been updated and the sequence ends. If the
/// iteration limit is reached first, one `Err(PowerFlowError::Convergence)`
/// follows the last record. Dropping the sequence early leaves the network
/// with the last voltage estimate.
pub struct StepByStep<'a> {
    net: &'a mut Network,
    lin_solver: Box<dyn LinearSolver + 'a>,
    opt: PFOpt,

    solver: Option<ActiveSolver>,
    nit: usize,
    status: Status,
}

impl<'a> StepByStep<'a> {
    fn new(net: &'a mut Network, opt: PFOpt, lin_solver: Box<dyn LinearSolver + 'a>) -> Self {
        Self {
            net,
            lin_solver,
            opt,
            solver: None,
            nit: 0,
            status: Status::Running,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self.status, Status::Converged)
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.status, Status::Failing(_) | Status::Failed)
    }

    fn method(&self) -> Method {
        self.opt.algorithm
    }

    fn before_solve(&mut self) -> Result<ActiveSolver> {
        self.net.validate()?;
        if !self.net.is_finalized() {
            self.net.build_diagonal()?;
        }
        self.net.init_voltage();
        log::trace!("V0: {}", format_polar_vec(self.net.bus_voltage_pu()));

        ActiveSolver::new(self.method(), self.net)
    }

    fn advance(&mut self) -> Result<Iteration> {
        let mut solver = match self.solver.take() {
            Some(solver) => solver,
            None => self.before_solve()?,
        };

        let out = solver.step(self.net, self.lin_solver.as_ref())?;
        let mut max_err = norm_inf(&out.mismatch);
        let mut data = out.data;

        // if there are Q limit violations, restart the solver with the new bus types
        let converted = if self.opt.enforce_q_limits && max_err.is_finite() {
            self.check_q_limits(&solver)
        } else {
            Vec::new()
        };
        let mut max_err_before_conversion = None;
        if !converted.is_empty() {
            max_err_before_conversion = Some(max_err);
            solver = ActiveSolver::new(self.method(), self.net)?;
            let out = solver.step(self.net, self.lin_solver.as_ref())?;
            max_err = norm_inf(&out.mismatch);
            data = out.data;
        }
        self.solver = Some(solver);

        let nit = self.nit;
        log::debug!("{:3}        {:10.3e}", nit, max_err);

        let converged = max_err <= self.opt.tolerance;
        if converged {
            self.after_solve();
            log::info!(
                "{} power flow converged in {} iterations.",
                self.method(),
                nit
            );
            self.status = Status::Converged;
        } else if nit >= self.opt.max_it || !max_err.is_finite() {
            log::info!(
                "{} power flow did not converge in {} iterations.",
                self.method(),
                nit
            );
            self.status = Status::Failing(PowerFlowError::Convergence {
                max_it: self.opt.max_it,
                max_err,
            });
        } else {
            self.nit += 1;
            self.status = Status::Running;
        }

        Ok(Iteration {
            nit,
            max_err,
            max_err_before_conversion,
            data,
            converted,
            converged,
        })
    }

    /// Switches every PV bus whose reactive generation is outside its
    /// limits to PQ, with the generation clamped to the violated limit.
    fn check_q_limits(&mut self, solver: &ActiveSolver) -> Vec<usize> {
        let mut converted = Vec::new();

        for i in 0..self.net.bus.len() {
            if !self.net.bus[i].is_pv() {
                continue;
            }
            let qg = solver.reactive_injection(self.net, i) + self.net.bus[i].s_load.im;
            let limits = self.net.bus[i].q_limits;
            if !limits.contains(qg) {
                let q = limits.clamp(qg);
                log::debug!("bus {} Qg = {} outside limits, fixed at {} (PV -> PQ)", i, qg, q);

                self.net.bus[i].switch_to_pq(q);
                self.net.converted.push(i);
                converted.push(i);
            }
        }
        converted
    }

    /// Computes the slack bus generation and the reactive generation of
    /// the remaining PV buses from the solved voltages.
    fn after_solve(&mut self) {
        let net = &mut *self.net;
        let s_inj = net.calculated_apparent_power();

        for (bus, s_inj) in net.bus.iter_mut().zip(s_inj) {
            if bus.is_ref() {
                bus.s_gen = s_inj + bus.s_load;
            } else if bus.is_pv() {
                bus.s_gen.im = s_inj.im + bus.s_load.im;
            }
        }
        log::trace!("V: {}", format_polar_vec(net.bus_voltage_pu()));
        log::trace!("S: {}", format_rect_vec(&net.bus_apparent_power_pu()));
    }
}

impl Iterator for StepByStep<'_> {
    type Item = Result<Iteration>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.status, Status::Failed) {
            Status::Running => Some(self.advance()),
            Status::Converged => {
                self.status = Status::Converged;
                None
            }
            Status::Failing(err) => Some(Err(err)),
            Status::Failed => None,
        }
    }
}

impl Network {
    /// Solves the power flow with the default sparse LU solver.
    pub fn solve(&mut self, method: Method, max_it: usize, tol: f64) -> Result<()> {
        let opt = PFOpt {
            algorithm: method,
            max_it,
            tolerance: tol,
            ..Default::default()
        };
        self.solve_with(&opt, RLU::default())
    }

    /// Solves the power flow, returning a convergence error if the
    /// mismatch is still above tolerance after `opt.max_it` iterations.
    pub fn solve_with<'a, S>(&'a mut self, opt: &PFOpt, lin_solver: S) -> Result<()>
    where
        S: LinearSolver + 'a,
    {
        for it in self.step_by_step_with(opt, lin_solver) {
            it?;
        }
        Ok(())
    }

    /// Iterates the power flow one step at a time with the default sparse
    /// LU solver.
    pub fn step_by_step(&mut self, method: Method, max_it: usize, tol: f64) -> StepByStep<'_> {
        let opt = PFOpt {
            algorithm: method,
            max_it,
            tolerance: tol,
            ..Default::default()
        };
        self.step_by_step_with(&opt, RLU::default())
    }

    pub fn step_by_step_with<'a, S>(&'a mut self, opt: &PFOpt, lin_solver: S) -> StepByStep<'a>
    where
        S: LinearSolver + 'a,
    {
        StepByStep::new(self, opt.clone(), Box::new(lin_solver))
    }
}
