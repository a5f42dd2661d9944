//! Error types for flow and linear solver operations.

use mf_core::{ErrorKind, MfError};
use mf_network::NetworkError;
use mf_rheology::RheologyError;
use thiserror::Error;

/// Errors that can occur while solving for the flow field.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Singular system: {what}")]
    SingularSystem { what: String },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Rheology error: {0}")]
    Rheology(#[from] RheologyError),

    #[error("Numeric error: {what}")]
    Numeric { what: String },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SolverError::SingularSystem { .. } => ErrorKind::SingularSystem,
            SolverError::ConvergenceFailed { .. } => ErrorKind::Convergence,
            SolverError::InvalidConfig { .. } => ErrorKind::InvalidArg,
            SolverError::Network(e) => e.kind(),
            SolverError::Rheology(RheologyError::InvalidArg { .. }) => ErrorKind::InvalidArg,
            SolverError::Rheology(_) | SolverError::Numeric { .. } => ErrorKind::Domain,
        }
    }
}

impl From<SolverError> for MfError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::SingularSystem { what } => MfError::SingularSystem { what },
            SolverError::ConvergenceFailed { what } => MfError::Convergence { what },
            SolverError::InvalidConfig { what } => MfError::InvalidArg { what },
            SolverError::Network(e) => e.into(),
            SolverError::Rheology(e) => e.into(),
            SolverError::Numeric { what } => MfError::Domain { what, value: f64::NAN },
        }
    }
}
