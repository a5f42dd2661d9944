//! mf-network: vascular network model for microflow.
//!
//! Provides:
//! - Core data structures (Node, Vessel, BoundaryCondition, Network)
//! - Incremental network builder with topology validation
//! - Restricted mutators for solver outputs and adapted diameters
//! - Read-only snapshots for logging and plotting
//!
//! # Example
//!
//! ```
//! use mf_core::units::{mmhg, um};
//! use mf_network::NetworkBuilder;
//!
//! let mut builder = NetworkBuilder::new();
//! let a = builder.add_node("arteriole");
//! let v = builder.add_node("venule");
//! builder.add_vessel("capillary", a, v, um(100.0), um(6.0));
//! builder.set_pressure_bc(a, mmhg(40.0));
//! builder.set_pressure_bc(v, mmhg(15.0));
//! let network = builder.build().unwrap();
//!
//! assert_eq!(network.nodes().len(), 2);
//! assert_eq!(network.vessels().len(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod snapshot;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::NetworkBuilder;
pub use error::{NetworkError, NetworkResult};
pub use graph::{BoundaryCondition, Network, Node, Vessel, VesselFlowState};
pub use snapshot::{NetworkSnapshot, NodeSnapshot, VesselSnapshot};
