use crate::bus::Branch;
use crate::cmplx;
use crate::error::{PowerFlowError, Result};
use crate::network::Network;

use num_complex::Complex64;
use sparsetools::coo::Coo;

/// Shunt admittances (p.u.) that come with a branch.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Shunts {
    /// Total line charging, split equally between both ends.
    pub y: Complex64,
    /// Line charging already halved, added to both ends.
    pub y_2: Complex64,
    /// Added to the `i` end only.
    pub y_i: Complex64,
    /// Added to the `j` end only.
    pub y_j: Complex64,
}

impl Shunts {
    /// Total line charging admittance `y`.
    pub fn line_charging(y: Complex64) -> Self {
        Self {
            y,
            ..Default::default()
        }
    }
}

impl Network {
    /// Connects buses `i` and `j` (0-based) through the series impedance `z`.
    pub fn connect(&mut self, i: usize, j: usize, z: Complex64) -> Result<()> {
        self.connect_buses_by_id(i, j, z, Shunts::default())
    }

    /// Writes the mutual admittance between buses `i` and `j` (0-based),
    /// accumulates the branch shunts on the diagonal and registers both
    /// buses as connected. Connecting a bus to itself does nothing.
    pub fn connect_buses_by_id(
        &mut self,
        i: usize,
        j: usize,
        z: Complex64,
        shunts: Shunts,
    ) -> Result<()> {
        self.add_branch(i, j, z, z, 1.0, shunts)
    }

    /// Same as `connect_buses_by_id` with buses numbered from 1.
    pub fn connect_buses_by_ieee_id(
        &mut self,
        i: usize,
        j: usize,
        z: Complex64,
        shunts: Shunts,
    ) -> Result<()> {
        let (i, j) = (self.from_ieee(i)?, self.from_ieee(j)?);
        self.connect_buses_by_id(i, j, z, shunts)
    }

    /// Connects buses `i` and `j` (0-based) through a transformer with
    /// off-nominal turns ratio `a` on the `i` side, as its equivalent
    /// pi circuit.
    pub fn connect_buses_with_taps_by_id(
        &mut self,
        i: usize,
        j: usize,
        z: Complex64,
        a: f64,
    ) -> Result<()> {
        let h = 1.0 / a;
        let shunts = Shunts {
            y_i: cmplx!(h * (h - 1.0)) / z,
            y_j: cmplx!(1.0 - h) / z,
            ..Default::default()
        };
        self.add_branch(i, j, z * a, z, a, shunts)
    }

    /// Same as `connect_buses_with_taps_by_id` with buses numbered from 1.
    pub fn connect_buses_with_taps_by_ieee_id(
        &mut self,
        i: usize,
        j: usize,
        z: Complex64,
        a: f64,
    ) -> Result<()> {
        let (i, j) = (self.from_ieee(i)?, self.from_ieee(j)?);
        self.connect_buses_with_taps_by_id(i, j, z, a)
    }

    fn from_ieee(&self, i: usize) -> Result<usize> {
        i.checked_sub(1).ok_or(PowerFlowError::BusIndex {
            index: i,
            n: self.len(),
        })
    }

    fn add_branch(
        &mut self,
        i: usize,
        j: usize,
        z: Complex64,
        z_nominal: Complex64,
        tap: f64,
        shunts: Shunts,
    ) -> Result<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Ok(());
        }
        if self.finalized {
            return Err(PowerFlowError::Finalized);
        }

        let y_ij = -z.inv();
        self.y_coo.push(i, j, y_ij);
        self.y_coo.push(j, i, y_ij);
        self.y_mutual[i] += y_ij;
        self.y_mutual[j] += y_ij;

        let y_half = shunts.y / 2.0 + shunts.y_2;
        self.y_coo.push(i, i, y_half + shunts.y_i);
        self.y_coo.push(j, j, y_half + shunts.y_j);

        if let Some(b) = self.bus.get_mut(i) {
            b.store_connected_bus(j);
        }
        if let Some(b) = self.bus.get_mut(j) {
            b.store_connected_bus(i);
        }
        self.branch.push(Branch {
            from: i,
            to: j,
            z: z_nominal,
            tap,
        });
        Ok(())
    }

    /// Completes the admittance matrix by setting each self admittance to
    /// `2 * Y[k,k] - sum(Y[k,:])`, i.e. the accumulated shunts minus the
    /// mutual admittances of row `k`, and compresses it. Must run once,
    /// after all connections are made.
    pub fn build_diagonal(&mut self) -> Result<()> {
        if self.finalized {
            return Err(PowerFlowError::Finalized);
        }
        let n = self.len();
        for k in 0..n {
            self.y_coo.push(k, k, -self.y_mutual[k]);
        }
        let y_coo = std::mem::replace(&mut self.y_coo, Coo::with_size(n, n));
        self.y_bus = y_coo.to_csr();

        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
