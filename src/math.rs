// Copyright (c) 2022-2024, Richard Lincoln. All rights reserved.

use num_complex::Complex64;

pub const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Computes the infinity norm: `max(abs(a))`.
///
/// An empty slice has a norm of zero, so a network without unknowns
/// is trivially converged. Any NaN element makes the norm NaN.
pub fn norm_inf(a: &[f64]) -> f64 {
    let mut max = 0.0;
    for v in a {
        if v.is_nan() {
            return f64::NAN;
        }
        max = f64::max(max, v.abs());
    }
    max
}

/// Complex power injected at each bus: `V .* conj(I)`.
pub fn power_injection(v: &[Complex64], i_bus: &[Complex64]) -> Vec<Complex64> {
    v.iter().zip(i_bus).map(|(v, i)| v * i.conj()).collect()
}
