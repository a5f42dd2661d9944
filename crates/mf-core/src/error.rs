use thiserror::Error;

pub type MfResult<T> = Result<T, MfError>;

/// Coarse failure category shared by every crate in the workspace.
///
/// `Convergence` is the only category a caller may reasonably retry
/// (e.g. with a relaxed tolerance); the others indicate a malformed network,
/// a misconfiguration or an unsolvable system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Topology,
    Domain,
    SingularSystem,
    Convergence,
    InvalidArg,
}

impl ErrorKind {
    /// True for categories that abort a run regardless of retry policy.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::Convergence)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MfError {
    #[error("Topology error: {what}")]
    Topology { what: String },

    #[error("Domain error: {what} (value={value})")]
    Domain { what: String, value: f64 },

    #[error("Singular system: {what}")]
    SingularSystem { what: String },

    #[error("Convergence failed: {what}")]
    Convergence { what: String },

    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },
}

impl MfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MfError::Topology { .. } => ErrorKind::Topology,
            MfError::Domain { .. } | MfError::NonFinite { .. } => ErrorKind::Domain,
            MfError::SingularSystem { .. } => ErrorKind::SingularSystem,
            MfError::Convergence { .. } => ErrorKind::Convergence,
            MfError::InvalidArg { .. } => ErrorKind::InvalidArg,
        }
    }
}
