mod steps;

use crate::{cmplx, Network, QLimits};
use num_complex::Complex64;
use sparsetools::csr::CSR;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {} (+/- {}), got {}",
        expected,
        tol,
        actual
    );
}

/// Dense copy of an `n x n` complex matrix, one column per product with
/// a unit vector.
pub(crate) fn to_dense(a: &CSR<usize, Complex64>, n: usize) -> Vec<Vec<Complex64>> {
    let mut dense = vec![vec![Complex64::default(); n]; n];
    for j in 0..n {
        let mut e = vec![Complex64::default(); n];
        e[j] = cmplx!(1.0);
        let col: Vec<Complex64> = a * &e;
        for (i, a_ij) in col.into_iter().enumerate() {
            dense[i][j] = a_ij;
        }
    }
    dense
}

pub(crate) fn to_dense_re(a: &CSR<usize, f64>, n: usize) -> Vec<Vec<f64>> {
    let mut dense = vec![vec![0.0; n]; n];
    for j in 0..n {
        let mut e = vec![0.0; n];
        e[j] = 1.0;
        let col: Vec<f64> = a * &e;
        for (i, a_ij) in col.into_iter().enumerate() {
            dense[i][j] = a_ij;
        }
    }
    dense
}

/// Dense admittance matrix of a finalized network.
pub(crate) fn y_dense(net: &Network) -> Vec<Vec<Complex64>> {
    to_dense(net.y_bus(), net.len())
}

/// Three bus system from Saadat, Power System Analysis, Example 6.9.
pub(crate) fn saadat3(q_limits: QLimits) -> Network {
    let mut ps = Network::new(3);

    ps.add_slack_bus(1.05, 0.0).unwrap();
    ps.add_pq_bus(4.0, 2.5).unwrap();
    ps.add_pv_bus(2.0, 1.04, q_limits).unwrap();

    let no_shunts = Default::default();
    ps.connect_buses_by_ieee_id(1, 2, cmplx!(0.02, 0.04), no_shunts)
        .unwrap();
    ps.connect_buses_by_ieee_id(2, 3, cmplx!(0.0125, 0.025), no_shunts)
        .unwrap();
    ps.connect_buses_by_ieee_id(3, 1, cmplx!(0.01, 0.03), no_shunts)
        .unwrap();
    ps
}

/// Calculated injections agree with the programmed powers of PQ buses,
/// and with the solved powers of every other bus.
pub(crate) fn assert_power_balance(ps: &Network, tol: f64) {
    let s_calc = ps.calculated_apparent_power();
    let s_bus = ps.bus_apparent_power_pu();
    for (i, (s_calc, s_bus)) in s_calc.iter().zip(&s_bus).enumerate() {
        let d: Complex64 = s_calc - s_bus;
        assert!(d.norm() < tol, "bus {}: mismatch {}", i, d);
    }
    for b in ps.buses().iter().filter(|b| b.is_pv() || b.is_ref()) {
        assert_close(ps.bus_voltage_pu()[b.i].norm(), b.vm, tol);
    }
}
