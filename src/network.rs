use crate::bus::{Branch, Bus, BusType, QLimits};
use crate::cmplx;
use crate::error::{PowerFlowError, Result};
use crate::math::power_injection;

use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csr::CSR;

/// Network owns the bus registry, the bus admittance matrix and the
/// complex voltage solution of an `n` bus power system.
///
/// Buses are registered in order, each `add_*` call taking the next free
/// index (0-based). Exactly one bus must be the slack bus.
#[derive(Clone)]
pub struct Network {
    n: usize,

    pub(crate) bus: Vec<Bus>,
    pub(crate) branch: Vec<Branch>,

    /// Mutual and shunt admittances pushed by connections.
    pub(crate) y_coo: Coo<usize, Complex64>,
    /// Sum of the mutual admittances in each row of Y.
    pub(crate) y_mutual: Vec<Complex64>,
    /// Bus admittance matrix, empty until finalized.
    pub(crate) y_bus: CSR<usize, Complex64>,

    pub(crate) v: Vec<Complex64>,

    pub(crate) finalized: bool,
    slack: Option<usize>,

    /// PV buses switched to PQ after violating a reactive limit.
    pub(crate) converted: Vec<usize>,
}

impl Network {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            bus: Vec::with_capacity(n),
            branch: Vec::new(),
            y_coo: Coo::with_size(n, n),
            y_mutual: vec![cmplx!(); n],
            y_bus: CSR::with_size(n, n),
            v: vec![cmplx!(1.0); n],
            finalized: false,
            slack: None,
            converted: Vec::new(),
        }
    }

    /// Number of buses.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn push_bus(&mut self, bus_type: BusType) -> Result<&mut Bus> {
        let i = self.bus.len();
        if i >= self.n {
            return Err(PowerFlowError::RegistryFull(self.n));
        }
        self.bus.push(Bus::new(i, bus_type));
        Ok(&mut self.bus[i])
    }

    /// Registers the slack bus with voltage magnitude `vm` (p.u.) and
    /// angle `va` (degrees).
    pub fn add_slack_bus(&mut self, vm: f64, va: f64) -> Result<usize> {
        if let Some(i) = self.slack {
            return Err(PowerFlowError::SlackAlreadyDefined(i));
        }
        let bus = self.push_bus(BusType::REF)?;
        bus.vm = vm;
        bus.va = va.to_radians();
        let i = bus.i;
        self.slack = Some(i);
        Ok(i)
    }

    /// Registers a load bus consuming `p + jq` (p.u.).
    pub fn add_pq_bus(&mut self, p: f64, q: f64) -> Result<usize> {
        let bus = self.push_bus(BusType::PQ)?;
        bus.s_load = cmplx!(p, q);
        Ok(bus.i)
    }

    /// Registers a generator bus producing `p` (p.u.) at voltage
    /// magnitude `vm`, with reactive generation bounded by `q_limits`.
    pub fn add_pv_bus(&mut self, p: f64, vm: f64, q_limits: QLimits) -> Result<usize> {
        let bus = self.push_bus(BusType::PV)?;
        bus.s_gen = cmplx!(p);
        bus.vm = vm;
        bus.q_limits = q_limits;
        Ok(bus.i)
    }

    /// Adds local demand `p + jq` (p.u.) to an already registered bus,
    /// on top of any load it already carries.
    pub fn set_load(&mut self, i: usize, p: f64, q: f64) -> Result<()> {
        let n = self.n;
        let bus = self
            .bus
            .get_mut(i)
            .ok_or(PowerFlowError::BusIndex { index: i, n })?;
        bus.s_load += cmplx!(p, q);
        Ok(())
    }

    pub(crate) fn check_index(&self, i: usize) -> Result<()> {
        if i < self.n {
            Ok(())
        } else {
            Err(PowerFlowError::BusIndex { index: i, n: self.n })
        }
    }

    /// Checks the registry is complete and returns the slack bus index.
    pub(crate) fn validate(&self) -> Result<usize> {
        if self.bus.len() != self.n {
            return Err(PowerFlowError::IncompleteRegistry {
                registered: self.bus.len(),
                n: self.n,
            });
        }
        self.slack.ok_or(PowerFlowError::NoSlack)
    }

    /// Flat start: setpoint magnitudes for REF and PV buses, 1 p.u. elsewhere.
    pub(crate) fn init_voltage(&mut self) {
        self.v = self
            .bus
            .iter()
            .map(|b| match b.bus_type {
                BusType::REF => Complex64::from_polar(b.vm, b.va),
                BusType::PV => cmplx!(b.vm),
                BusType::PQ => cmplx!(1.0),
            })
            .collect();
    }

    pub fn buses(&self) -> &[Bus] {
        &self.bus
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branch
    }

    pub fn slack_bus(&self) -> Option<usize> {
        self.slack
    }

    /// Bus admittance matrix. Empty until `build_diagonal` has run.
    pub fn y_bus(&self) -> &CSR<usize, Complex64> {
        &self.y_bus
    }

    pub fn converted_pv_buses(&self) -> &[usize] {
        &self.converted
    }

    /// Complex bus voltages (p.u.).
    pub fn bus_voltage_pu(&self) -> &[Complex64] {
        &self.v
    }

    /// Net complex power injected at each bus (p.u.). Slack power and PV
    /// reactive power are filled in by a successful solve.
    pub fn bus_apparent_power_pu(&self) -> Vec<Complex64> {
        self.bus.iter().map(|b| b.s_bus()).collect()
    }

    /// Complex power generation at each bus (p.u.).
    pub fn bus_generation_pu(&self) -> Vec<Complex64> {
        self.bus.iter().map(|b| b.s_gen).collect()
    }

    /// Complex power demand at each bus (p.u.).
    pub fn bus_load_pu(&self) -> Vec<Complex64> {
        self.bus.iter().map(|b| b.s_load).collect()
    }

    /// Power injected at each bus by the present voltages: `V .* conj(Y * V)`.
    pub fn calculated_apparent_power(&self) -> Vec<Complex64> {
        let i_bus: Vec<Complex64> = &self.y_bus * &self.v;
        power_injection(&self.v, &i_bus)
    }

    /// Programmed minus calculated power at each bus.
    pub fn apparent_power_mismatch(&self) -> Vec<Complex64> {
        self.bus
            .iter()
            .zip(self.calculated_apparent_power())
            .map(|(b, s_calc)| b.s_bus() - s_calc)
            .collect()
    }
}
