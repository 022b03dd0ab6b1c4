use num_complex::Complex64;
use std::collections::BTreeSet;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BusType {
    /// Fixed active and reactive power.
    PQ,
    /// Fixed voltage magnitude and active power.
    PV,
    /// Reference voltage magnitude and angle. Slack active and reactive power.
    REF,
}

/// Reactive generation limits of a voltage controlled bus (p.u.).
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct QLimits {
    pub qmin: f64,
    pub qmax: f64,
}

impl QLimits {
    pub fn new(qmin: f64, qmax: f64) -> Self {
        Self { qmin, qmax }
    }

    pub fn contains(&self, q: f64) -> bool {
        q >= self.qmin && q <= self.qmax
    }

    pub fn clamp(&self, q: f64) -> f64 {
        q.max(self.qmin).min(self.qmax)
    }
}

impl Default for QLimits {
    fn default() -> Self {
        Self {
            qmin: f64::NEG_INFINITY,
            qmax: f64::INFINITY,
        }
    }
}

/// Bus is a node of the network. All powers are per-unit, positive
/// when generated for `s_gen` and when consumed for `s_load`.
#[derive(Debug, Clone)]
pub struct Bus {
    /// Position in the admittance matrix (0-based).
    pub i: usize,

    pub bus_type: BusType,

    /// Complex power generation.
    pub s_gen: Complex64,

    /// Complex power demand.
    pub s_load: Complex64,

    /// Voltage magnitude setpoint, only meaningful for PV and REF buses.
    pub vm: f64,

    /// Voltage angle (radians), only meaningful for the REF bus.
    pub va: f64,

    pub q_limits: QLimits,

    /// Indices of the buses connected through a branch.
    pub connected: BTreeSet<usize>,
}

impl Bus {
    pub(crate) fn new(i: usize, bus_type: BusType) -> Self {
        Self {
            i,
            bus_type,
            s_gen: Complex64::default(),
            s_load: Complex64::default(),
            vm: 1.0,
            va: 0.0,
            q_limits: QLimits::default(),
            connected: BTreeSet::new(),
        }
    }

    pub fn is_pq(&self) -> bool {
        self.bus_type == BusType::PQ
    }
    pub fn is_pv(&self) -> bool {
        self.bus_type == BusType::PV
    }
    pub fn is_ref(&self) -> bool {
        self.bus_type == BusType::REF
    }

    /// Net programmed injection (generation minus load).
    pub fn s_bus(&self) -> Complex64 {
        self.s_gen - self.s_load
    }

    pub(crate) fn store_connected_bus(&mut self, j: usize) {
        self.connected.insert(j);
    }

    /// Converts a voltage controlled bus into a load bus with the reactive
    /// generation held at `qg`.
    pub(crate) fn switch_to_pq(&mut self, qg: f64) {
        self.s_gen.im = qg;
        self.bus_type = BusType::PQ;
    }
}

/// Branch is a series element registered between two buses.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub from: usize,
    pub to: usize,

    /// Nominal series impedance (p.u.), before any tap scaling.
    pub z: Complex64,

    /// Off-nominal turns ratio, 1 for lines.
    pub tap: f64,
}
