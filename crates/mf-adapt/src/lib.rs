//! Structural adaptation of microvascular networks.
//!
//! Provides:
//! - Stimulus law (wall shear stress, transmural pressure, metabolic and
//!   conducted responses, shrinking tendency)
//! - Pseudo-time integration of vessel diameters with bounds
//! - Adaptation runner with progress snapshots and distinct converged /
//!   step-cap outcomes
//! - Parallel batch runs over independent networks

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod integrator;
pub mod stimulus;

// Re-exports for public API
pub use batch::{BatchJob, BatchResult, run_batch};
pub use config::{AdaptationConfig, IntegratorType, StimulusWeights};
pub use engine::{
    AdaptationOutcome, AdaptationProgress, AdaptationStatus, StepReport, adapt_step,
    run_adaptation, run_adaptation_with_progress,
};
pub use error::{AdaptError, AdaptResult};
pub use integrator::{DiameterModel, ForwardEuler, Heun, Integrator};
pub use stimulus::{VesselStimulus, compute_stimuli, pressure_set_point};
