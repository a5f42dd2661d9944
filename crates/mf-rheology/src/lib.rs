//! mf-rheology: blood rheology laws for microflow.
//!
//! Provides:
//! - Apparent viscosity laws (Newtonian, in-vitro and in-vivo Pries fits)
//! - Poiseuille resistance and wall shear stress
//! - Phase-separation laws for diverging bifurcations
//! - Flow-weighted mixing for converging nodes
//! - Discharge/tube hematocrit conversion (Fåhræus effect)
//!
//! # Architecture
//!
//! Every function takes an explicit [`RheologyConfig`]; there is no ambient
//! parameter state, so independent solves can run on different threads with
//! different laws. Empirical fits are tagged variants behind the
//! [`ViscosityModel`] and [`PhaseSeparation`] traits, so the flow solver never
//! matches on a specific law.
//!
//! # Example
//!
//! ```
//! use mf_rheology::{RheologyConfig, apparent_viscosity, resistance};
//!
//! let cfg = RheologyConfig::default();
//! let mu = apparent_viscosity(&cfg, 10e-6, 0.45).unwrap();
//! let r = resistance(10e-6, 100e-6, mu).unwrap();
//! assert!(mu > cfg.plasma_viscosity);
//! assert!(r > 0.0);
//! ```

pub mod config;
pub mod error;
pub mod hematocrit;
pub mod mixing;
pub mod resistance;
pub mod separation;
pub mod viscosity;

// Re-exports for ergonomics
pub use config::{PhaseSeparationLaw, RheologyConfig, ViscosityLaw};
pub use error::{RheologyError, RheologyResult};
pub use hematocrit::{discharge_from_tube, tube_hematocrit};
pub use mixing::{MixInput, mix};
pub use resistance::{resistance, wall_shear_stress};
pub use separation::{PhaseSeparation, SplitInput, SplitRecord, phase_separation};
pub use viscosity::{ViscosityModel, apparent_viscosity};
