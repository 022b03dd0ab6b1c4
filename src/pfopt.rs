use crate::error::PowerFlowError;
use derive_builder::Builder;
use std::fmt;
use std::str::FromStr;

/// AC power flow solving method.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum Method {
    /// Newton's method on nodal current injections.
    #[default]
    CurrentInjection,
    /// Fast-Decoupled method (XB version).
    FastDecoupled,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::CurrentInjection => "current injections",
            Method::FastDecoupled => "fast decoupled",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = PowerFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current inyections" | "current injections" | "cilf" => Ok(Method::CurrentInjection),
            "fast decoupled" | "fdlf" => Ok(Method::FastDecoupled),
            _ => Err(PowerFlowError::UnknownMethod(s.to_string())),
        }
    }
}

/// Power flow options.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default)]
pub struct PFOpt {
    /// AC power flow algorithm.
    pub algorithm: Method,

    /// Maximum number of iterations. Default value is 25.
    pub max_it: usize,

    /// Termination tolerance on per unit P & Q mismatch. Default value is 1e-9.
    pub tolerance: f64,

    /// Convert PV buses to PQ when their reactive generation leaves its limits.
    pub enforce_q_limits: bool,
}

impl Default for PFOpt {
    fn default() -> Self {
        Self {
            algorithm: Method::default(),
            max_it: 25,
            tolerance: 1e-9,
            enforce_q_limits: true,
        }
    }
}
