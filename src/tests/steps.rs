use super::{assert_close, assert_power_balance, init_logger, saadat3};
use crate::traits::LinearSolver;
use crate::{cmplx, Method, Network, PFOpt, PowerFlowError, QLimits, StepData};
use sparsetools::csc::CSC;

#[test]
fn records_are_numbered_from_zero() {
    init_logger();
    let mut ps = saadat3(QLimits::default());
    let mut steps = ps.step_by_step(Method::CurrentInjection, 25, 1e-9);

    let mut nits = Vec::new();
    for it in &mut steps {
        let it = it.unwrap();
        assert!(matches!(it.data, StepData::Jacobian(_)));
        nits.push(it.nit);
    }
    assert_eq!(nits, vec![0, 1, 2]);
    assert!(steps.is_converged());
    assert!(!steps.has_failed());
    assert!(steps.next().is_none());
}

#[test]
fn iteration_limit_raises_convergence_error() {
    init_logger();
    let mut ps = saadat3(QLimits::default());
    let mut steps = ps.step_by_step(Method::CurrentInjection, 1, 1e-12);

    let first = steps.next().unwrap().unwrap();
    let last = steps.next().unwrap().unwrap();
    assert_eq!((first.nit, last.nit), (0, 1));
    assert!(!last.converged);

    match steps.next() {
        Some(Err(PowerFlowError::Convergence { max_it, max_err })) => {
            assert_eq!(max_it, 1);
            assert_eq!(max_err, last.max_err);
        }
        other => panic!("expected convergence error, got {:?}", other),
    }
    assert!(steps.has_failed());
    assert!(steps.next().is_none());
}

#[test]
fn record_count_is_bounded() {
    for max_it in [0, 3, 5] {
        let mut ps = saadat3(QLimits::default());
        let records: Vec<_> = ps
            .step_by_step(Method::FastDecoupled, max_it, 1e-12)
            .collect();
        let ok = records.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, max_it + 1);
        assert!(matches!(
            records.last(),
            Some(Err(PowerFlowError::Convergence { .. }))
        ));
    }
}

#[test]
fn failed_solve_keeps_last_estimate() {
    let mut ps = saadat3(QLimits::default());
    let err = ps.solve(Method::FastDecoupled, 2, 1e-9).unwrap_err();
    assert!(matches!(err, PowerFlowError::Convergence { max_it: 2, .. }));

    // Not the flat start, and no post-solve slack power.
    assert!(ps.bus_voltage_pu()[1].arg() < 0.0);
    assert_eq!(ps.bus_generation_pu()[0], cmplx!());
}

#[test]
fn abandoned_sequence_has_no_further_effect() {
    let mut ps = saadat3(QLimits::default());
    let first = ps
        .step_by_step(Method::CurrentInjection, 25, 1e-9)
        .next()
        .unwrap()
        .unwrap();
    assert!(!first.converged);
    assert!(ps.is_finalized());
    assert_eq!(ps.bus_generation_pu()[0], cmplx!());
}

#[test]
fn two_bus_matched_voltages_without_power() {
    init_logger();
    let mut ps = Network::new(2);
    ps.add_slack_bus(1.0, 0.0).unwrap();
    ps.add_pv_bus(0.0, 1.0, QLimits::default()).unwrap();
    ps.connect(0, 1, cmplx!(0.01, 0.1)).unwrap();

    for method in [Method::CurrentInjection, Method::FastDecoupled] {
        ps.solve(method, 25, 1e-9).unwrap();
        for mis in ps.apparent_power_mismatch() {
            assert!(mis.norm() < 1e-9);
        }
        assert_close(ps.bus_apparent_power_pu()[0].norm(), 0.0, 1e-9);
    }
}

#[test]
fn single_bus_network_converges_immediately() {
    let mut ps = Network::new(1);
    ps.add_slack_bus(1.0, 0.0).unwrap();
    let records: Vec<_> = ps
        .step_by_step(Method::CurrentInjection, 25, 1e-9)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].max_err, 0.0);
}

#[test]
fn incomplete_network_is_rejected() {
    let mut ps = Network::new(2);
    ps.add_slack_bus(1.0, 0.0).unwrap();
    assert_eq!(
        ps.solve(Method::CurrentInjection, 25, 1e-9),
        Err(PowerFlowError::IncompleteRegistry { registered: 1, n: 2 })
    );
}

/// Dense Gaussian elimination with partial pivoting.
struct Gauss;

impl LinearSolver for Gauss {
    fn solve(&self, a_mat: &CSC<usize, f64>, b: &mut [f64]) -> anyhow::Result<()> {
        let n = b.len();
        let mut a = vec![vec![0.0; n]; n];
        for j in 0..a_mat.cols() {
            for k in a_mat.colptr()[j]..a_mat.colptr()[j + 1] {
                a[a_mat.rowidx()[k]][j] += a_mat.values()[k];
            }
        }
        for c in 0..n {
            let p = (c..n)
                .max_by(|&i, &j| a[i][c].abs().total_cmp(&a[j][c].abs()))
                .ok_or_else(|| anyhow::format_err!("empty pivot range"))?;
            if a[p][c] == 0.0 {
                anyhow::bail!("singular matrix");
            }
            a.swap(c, p);
            b.swap(c, p);
            for r in c + 1..n {
                let f = a[r][c] / a[c][c];
                for k in c..n {
                    a[r][k] -= f * a[c][k];
                }
                b[r] -= f * b[c];
            }
        }
        for r in (0..n).rev() {
            let s: f64 = (r + 1..n).map(|k| a[r][k] * b[k]).sum();
            b[r] = (b[r] - s) / a[r][r];
        }
        Ok(())
    }
}

#[test]
fn any_linear_solver_can_drive_the_solve() {
    let mut sparse = saadat3(QLimits::default());
    sparse.solve(Method::CurrentInjection, 25, 1e-9).unwrap();

    let mut dense = saadat3(QLimits::default());
    dense.solve_with(&PFOpt::default(), Gauss).unwrap();

    for (a, b) in sparse.bus_voltage_pu().iter().zip(dense.bus_voltage_pu()) {
        assert!((a - b).norm() < 1e-10);
    }
}

/// Bus 1 is isolated and unloaded, so the Jacobian is all zeros.
fn isolated_pq_bus() -> Network {
    let mut ps = Network::new(2);
    ps.add_slack_bus(1.0, 0.0).unwrap();
    ps.add_pq_bus(0.0, 0.0).unwrap();
    ps
}

#[test]
fn singular_system_aborts_the_solve() {
    let mut ps = isolated_pq_bus();
    let res = ps.solve_with(&PFOpt::default(), Gauss);
    assert!(matches!(res, Err(PowerFlowError::LinearSolve(_))));
}

#[test]
fn singular_system_is_an_error_with_sparse_lu() {
    init_logger();
    let mut ps = isolated_pq_bus();
    let mut steps = ps.step_by_step(Method::CurrentInjection, 25, 1e-9);
    match steps.next() {
        Some(Err(PowerFlowError::LinearSolve(msg))) => assert!(msg.contains("singular"), "{}", msg),
        other => panic!("expected linear solve error, got {:?}", other),
    }
    assert!(steps.next().is_none());
}

#[test]
fn resistive_branch_solves_with_current_injections_only() {
    init_logger();
    let network = || {
        let mut ps = Network::new(3);
        ps.add_slack_bus(1.0, 0.0).unwrap();
        ps.add_pq_bus(0.2, 0.1).unwrap();
        ps.add_pq_bus(0.1, 0.0).unwrap();
        ps.connect(0, 1, cmplx!(0.01, 0.1)).unwrap();
        ps.connect(1, 2, cmplx!(0.05, 0.0)).unwrap();
        ps
    };

    let mut ci = network();
    ci.solve(Method::CurrentInjection, 25, 1e-9).unwrap();
    assert_power_balance(&ci, 1e-8);

    let mut fd = network();
    assert_eq!(
        fd.solve(Method::FastDecoupled, 25, 1e-9),
        Err(PowerFlowError::ZeroReactance { from: 1, to: 2 })
    );
}

/// Returns NaN for every unknown.
struct NanSolver;

impl LinearSolver for NanSolver {
    fn solve(&self, _a_mat: &CSC<usize, f64>, b: &mut [f64]) -> anyhow::Result<()> {
        b.iter_mut().for_each(|x| *x = f64::NAN);
        Ok(())
    }
}

#[test]
fn nan_mismatch_never_converges() {
    init_logger();
    let mut ps = saadat3(QLimits::new(-1.0, 1.0));
    let opt = PFOpt {
        tolerance: 1e-3,
        ..Default::default()
    };
    let mut steps = ps.step_by_step_with(&opt, NanSolver);

    let first = steps.next().unwrap().unwrap();
    assert!(first.max_err.is_nan());
    assert!(!first.converged);
    assert!(first.converted.is_empty());

    match steps.next() {
        Some(Err(PowerFlowError::Convergence { max_it, max_err })) => {
            assert_eq!(max_it, 25);
            assert!(max_err.is_nan());
        }
        other => panic!("expected convergence error, got {:?}", other),
    }
    assert!(!steps.is_converged());
    assert!(steps.next().is_none());
    drop(steps);
    assert_eq!(ps.bus_generation_pu()[0], cmplx!());
}
