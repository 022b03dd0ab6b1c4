use anyhow::{bail, Result};
use sparsetools::csc::CSC;

/// Solves square real linear systems `A x = b` in place.
pub trait LinearSolver {
    fn solve(&self, a_mat: &CSC<usize, f64>, b: &mut [f64]) -> Result<()>;
}

impl<S> LinearSolver for S
where
    S: spsolve::Solver<usize, f64>,
{
    fn solve(&self, a_mat: &CSC<usize, f64>, b: &mut [f64]) -> Result<()> {
        let n = a_mat.cols();
        if n != b.len() {
            bail!("dimension mismatch: A has {} columns, b has {} rows", n, b.len());
        }
        if n == 0 {
            return Ok(());
        }
        check_structure(n, a_mat.rowidx(), a_mat.colptr(), a_mat.values())?;

        spsolve::Solver::solve(
            self,
            n,
            a_mat.rowidx(),
            a_mat.colptr(),
            a_mat.values(),
            b,
            false,
        )
    }
}

/// Rejects matrices with a row or column that holds no non-zero value.
/// Such a matrix is singular and the AMD ordering cannot handle it.
fn check_structure(n: usize, rowidx: &[usize], colptr: &[usize], values: &[f64]) -> Result<()> {
    let mut row_nz = vec![false; n];
    for j in 0..n {
        let mut col_nz = false;
        for k in colptr[j]..colptr[j + 1] {
            if values[k] != 0.0 {
                col_nz = true;
                row_nz[rowidx[k]] = true;
            }
        }
        if !col_nz {
            bail!("matrix is singular: column {} is empty", j);
        }
    }
    if let Some(i) = row_nz.iter().position(|&nz| !nz) {
        bail!("matrix is singular: row {} is empty", i);
    }
    Ok(())
}
