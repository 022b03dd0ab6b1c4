use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("power flow did not converge in {max_it} iterations (max mismatch {max_err:e} p.u.)")]
    Convergence { max_it: usize, max_err: f64 },

    #[error("bus index {index} out of range for a network of {n} buses")]
    BusIndex { index: usize, n: usize },

    #[error("bus {0} is already the slack bus")]
    SlackAlreadyDefined(usize),

    #[error("network has no slack bus")]
    NoSlack,

    #[error("all {0} buses are already registered")]
    RegistryFull(usize),

    #[error("only {registered} of {n} buses are registered")]
    IncompleteRegistry { registered: usize, n: usize },

    #[error("admittance matrix is finalized, no more connections allowed")]
    Finalized,

    #[error("unknown power flow method {0:?}")]
    UnknownMethod(String),

    #[error("branch {from}-{to} has no series reactance, fast decoupled B' is undefined")]
    ZeroReactance { from: usize, to: usize },

    #[error("sparse matrix operation failed: {0}")]
    Matrix(String),

    #[error("linear solve failed: {0}")]
    LinearSolve(String),
}

pub type Result<T> = std::result::Result<T, PowerFlowError>;

impl From<anyhow::Error> for PowerFlowError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PowerFlowError>() {
            Ok(err) => err,
            Err(err) => PowerFlowError::Matrix(err.to_string()),
        }
    }
}
