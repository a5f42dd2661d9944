//! Error types for diameter adaptation.

use mf_core::{ErrorKind, MfError};
use mf_network::NetworkError;
use mf_rheology::RheologyError;
use mf_solver::SolverError;
use thiserror::Error;

/// Errors encountered while adapting diameters.
#[derive(Error, Debug)]
pub enum AdaptError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A diameter or stimulus left its physical domain.
    #[error("Domain error: {what} (value={value})")]
    Domain { what: String, value: f64 },

    #[error("Flow solve failed: {0}")]
    Solver(#[from] SolverError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Rheology error: {0}")]
    Rheology(#[from] RheologyError),
}

pub type AdaptResult<T> = Result<T, AdaptError>;

impl AdaptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdaptError::InvalidArg { .. } => ErrorKind::InvalidArg,
            AdaptError::Domain { .. } => ErrorKind::Domain,
            AdaptError::Solver(e) => e.kind(),
            AdaptError::Network(e) => e.kind(),
            AdaptError::Rheology(RheologyError::InvalidArg { .. }) => ErrorKind::InvalidArg,
            AdaptError::Rheology(_) => ErrorKind::Domain,
        }
    }
}

impl From<AdaptError> for MfError {
    fn from(e: AdaptError) -> Self {
        match e {
            AdaptError::InvalidArg { what } => MfError::InvalidArg {
                what: what.to_string(),
            },
            AdaptError::Domain { what, value } => MfError::Domain { what, value },
            AdaptError::Solver(e) => e.into(),
            AdaptError::Network(e) => e.into(),
            AdaptError::Rheology(e) => e.into(),
        }
    }
}
