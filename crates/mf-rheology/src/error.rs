//! Rheology errors.

use mf_core::MfError;
use thiserror::Error;

/// Result type for rheology operations.
pub type RheologyResult<T> = Result<T, RheologyError>;

/// Errors raised by rheology laws.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RheologyError {
    /// A physical quantity is outside its valid domain (e.g. diameter <= 0).
    #[error("Value out of domain for {what}: {value}")]
    Domain { what: &'static str, value: f64 },

    /// NaN or infinite input.
    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    /// Inconsistent argument shapes.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}

impl From<RheologyError> for MfError {
    fn from(err: RheologyError) -> Self {
        match err {
            RheologyError::Domain { what, value } => MfError::Domain {
                what: what.to_string(),
                value,
            },
            RheologyError::NonFinite { what, value } => MfError::NonFinite { what, value },
            RheologyError::InvalidArg { what } => MfError::InvalidArg {
                what: what.to_string(),
            },
        }
    }
}

/// Finite and strictly positive, otherwise a domain error.
pub(crate) fn positive(value: f64, what: &'static str) -> RheologyResult<f64> {
    if !value.is_finite() {
        return Err(RheologyError::NonFinite { what, value });
    }
    if value <= 0.0 {
        return Err(RheologyError::Domain { what, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::ErrorKind;

    #[test]
    fn domain_maps_to_domain_kind() {
        let err: MfError = RheologyError::Domain {
            what: "diameter",
            value: 0.0,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Domain);
    }

    #[test]
    fn positive_rejects_nan_and_zero() {
        assert!(matches!(
            positive(f64::NAN, "x"),
            Err(RheologyError::NonFinite { .. })
        ));
        assert!(matches!(
            positive(0.0, "x"),
            Err(RheologyError::Domain { .. })
        ));
        assert_eq!(positive(2.0, "x"), Ok(2.0));
    }
}
