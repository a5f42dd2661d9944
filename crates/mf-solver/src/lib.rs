//! Steady-state flow solver for microvascular networks.
//!
//! The unknowns are node pressures; vessel flows follow from Poiseuille
//! resistances, and vessel hematocrit follows from the flow split through the
//! rheology laws. Because resistance depends on hematocrit, the solve is a
//! fixed-point iteration around a linear pressure solve.
//!
//! # Example
//!
//! ```
//! use mf_core::units::{mmhg, um};
//! use mf_network::NetworkBuilder;
//! use mf_solver::{FlowConfig, solve_flow};
//!
//! let mut builder = NetworkBuilder::new();
//! let a = builder.add_node("arteriole");
//! let v = builder.add_node("venule");
//! builder.add_vessel("capillary", a, v, um(200.0), um(8.0));
//! builder.set_pressure_bc(a, mmhg(40.0));
//! builder.set_pressure_bc(v, mmhg(15.0));
//! let mut network = builder.build().unwrap();
//!
//! let solution = solve_flow(&mut network, &FlowConfig::default()).unwrap();
//! assert!(solution.flows[0] > 0.0);
//! ```

pub mod assemble;
pub mod config;
pub mod error;
pub mod flow;
pub mod linear;
pub mod propagate;

pub use assemble::assemble_laplacian;
pub use config::{
    ConvergenceCriterion, FlowConfig, HematocritSeed, LinearSolverConfig, LinearSolverKind,
    MultigridConfig,
};
pub use error::{SolverError, SolverResult};
pub use flow::{FlowProgressEvent, FlowSolution, solve_flow, solve_flow_with_progress};
pub use linear::{DirectSolver, LinearBackend, MultigridSolver, select_backend};
pub use propagate::NodeSplit;
