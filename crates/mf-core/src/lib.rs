//! mf-core: stable foundation for microflow.
//!
//! Contains:
//! - units (uom SI types + constructors, micro-scale helpers)
//! - numeric (Real + tolerances + float helpers)
//! - ids (stable compact IDs for nodes and vessels)
//! - error (shared error taxonomy)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{ErrorKind, MfError, MfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
