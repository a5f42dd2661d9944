//! Network-specific error types.

use mf_core::{ErrorKind, MfError, NodeId, VesselId};

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Network construction, validation and mutation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// The network has no nodes or no vessels.
    #[error("Network has no nodes or no vessels")]
    Empty,

    /// A vessel refers to a node that doesn't exist.
    #[error("Vessel {vessel} refers to non-existent node {node}")]
    InvalidNodeRef { vessel: VesselId, node: NodeId },

    /// A vessel starts and ends at the same node.
    #[error("Vessel {vessel} starts and ends at node {node}")]
    SelfLoop { vessel: VesselId, node: NodeId },

    /// Two vessels share the same ordered (from, to) pair.
    #[error("Vessel {vessel} duplicates an existing vessel from node {from} to node {to}")]
    DuplicateVessel {
        vessel: VesselId,
        from: NodeId,
        to: NodeId,
    },

    /// Length or diameter is non-positive or non-finite.
    #[error("Vessel {vessel} has non-positive {what} ({value})")]
    NonPositiveGeometry {
        vessel: VesselId,
        what: &'static str,
        value: f64,
    },

    /// A node has no incident vessel.
    #[error("Node {node} has no incident vessel")]
    IsolatedNode { node: NodeId },

    /// The graph splits into more than one connected component.
    #[error("Network has {components} connected components (expected 1)")]
    Disconnected { components: usize },

    /// Boundary conditions leave the flow problem without a unique solution.
    #[error("Boundary conditions under-determined: {what}")]
    Underdetermined { what: String },

    /// Boundary conditions contradict each other.
    #[error("Boundary conditions over-determined: {what}")]
    Overdetermined { what: String },

    /// A prescribed boundary quantity is outside its physical range.
    #[error("Node {node} has invalid {what} ({value})")]
    InvalidBoundary { node: NodeId, what: &'static str, value: f64 },

    /// A mutator was handed a value outside its physical domain.
    #[error("Value out of domain for {what}: {value}")]
    Domain { what: &'static str, value: f64 },

    /// ID not found in the network.
    #[error("{what} not found in network")]
    IdNotFound { what: &'static str },
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::Domain { .. } => ErrorKind::Domain,
            NetworkError::IdNotFound { .. } => ErrorKind::InvalidArg,
            _ => ErrorKind::Topology,
        }
    }
}

impl From<NetworkError> for MfError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Domain { what, value } => MfError::Domain {
                what: what.to_string(),
                value,
            },
            NetworkError::IdNotFound { what } => MfError::InvalidArg {
                what: what.to_string(),
            },
            other => MfError::Topology {
                what: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_errors_map_to_topology_kind() {
        let err = NetworkError::Disconnected { components: 2 };
        assert_eq!(err.kind(), ErrorKind::Topology);
        let core: MfError = err.into();
        assert_eq!(core.kind(), ErrorKind::Topology);
        assert!(core.to_string().contains("2 connected components"));
    }

    #[test]
    fn messages_name_the_offending_items() {
        let err = NetworkError::InvalidBoundary {
            node: NodeId::from_index(3),
            what: "inflow hematocrit",
            value: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("inflow hematocrit"), "{msg}");
        assert!(msg.contains("1.5"), "{msg}");
        let err: Box<dyn std::error::Error> = Box::new(NetworkError::Empty);
        assert_eq!(err.to_string(), "Network has no nodes or no vessels");
    }

    #[test]
    fn mutator_errors_map_to_domain_kind() {
        let err = NetworkError::Domain {
            what: "diameter",
            value: -1.0,
        };
        let core: MfError = err.into();
        assert_eq!(core.kind(), ErrorKind::Domain);
    }
}
