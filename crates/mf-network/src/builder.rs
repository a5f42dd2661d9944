//! Incremental network builder.

use std::collections::HashMap;

use mf_core::units::{Length, Pressure, VolumeRate};
use mf_core::{NodeId, VesselId};

use crate::error::NetworkResult;
use crate::graph::{BoundaryCondition, Network, Node, Vessel, VesselFlowState};
use crate::validate;

/// Builder for constructing a network incrementally.
///
/// Use `add_node` and `add_vessel` to build up the graph, attach boundary
/// conditions, then call `build()` to validate and freeze the topology.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    nodes: Vec<Node>,
    vessels: Vec<Vessel>,
    next_node_id: u32,
    next_vessel_id: u32,
}

impl NetworkBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an internal node and return its ID.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId::from_index(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.push(Node {
            id,
            name: name.into(),
            position: None,
            boundary: BoundaryCondition::None,
            inflow_hematocrit: None,
            pressure: 0.0,
        });
        id
    }

    /// Add a node with a known position (m).
    pub fn add_node_at(&mut self, name: impl Into<String>, position: [f64; 3]) -> NodeId {
        let id = self.add_node(name);
        self.nodes[id.slot()].position = Some(position);
        id
    }

    /// Add a vessel from `from` to `to`. Geometry is checked in `build()`.
    pub fn add_vessel(
        &mut self,
        name: impl Into<String>,
        from: NodeId,
        to: NodeId,
        length: Length,
        diameter: Length,
    ) -> VesselId {
        let id = VesselId::from_index(self.next_vessel_id);
        self.next_vessel_id += 1;
        self.vessels.push(Vessel {
            id,
            name: name.into(),
            from,
            to,
            length: length.value,
            nominal_diameter: diameter.value,
            diameter: diameter.value,
            state: VesselFlowState::default(),
        });
        id
    }

    /// Fix the pressure at a node.
    pub fn set_pressure_bc(&mut self, node: NodeId, pressure: Pressure) {
        self.set_boundary(node, BoundaryCondition::Pressure(pressure.value));
    }

    /// Prescribe the external flow at a node (positive = into the network).
    pub fn set_flow_bc(&mut self, node: NodeId, flow: VolumeRate) {
        self.set_boundary(node, BoundaryCondition::Flow(flow.value));
    }

    pub fn set_boundary(&mut self, node: NodeId, bc: BoundaryCondition) {
        if let Some(n) = self.nodes.get_mut(node.slot()) {
            n.boundary = bc;
        }
    }

    /// Discharge hematocrit of blood entering at this node.
    pub fn set_inflow_hematocrit(&mut self, node: NodeId, hematocrit: f64) {
        if let Some(n) = self.nodes.get_mut(node.slot()) {
            n.inflow_hematocrit = Some(hematocrit);
        }
    }

    /// Rename a node (useful for post-construction adjustments).
    pub fn rename_node(&mut self, node_id: NodeId, new_name: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(node_id.slot()) {
            node.name = new_name.into();
        }
    }

    /// Validate and build the network.
    ///
    /// Fails on disconnected graphs, duplicate (from, to) pairs, non-positive
    /// geometry and boundary conditions that do not determine a unique flow.
    pub fn build(self) -> NetworkResult<Network> {
        validate::validate_structure(&self.nodes, &self.vessels)?;

        let (node_vessel_offsets, node_vessels) =
            Self::build_adjacency(&self.nodes, &self.vessels);

        validate::validate_connectivity(
            &self.nodes,
            &self.vessels,
            &node_vessel_offsets,
            &node_vessels,
        )?;
        validate::validate_boundaries(&self.nodes)?;

        tracing::debug!(
            nodes = self.nodes.len(),
            vessels = self.vessels.len(),
            "network built"
        );

        Ok(Network {
            nodes: self.nodes,
            vessels: self.vessels,
            node_vessel_offsets,
            node_vessels,
        })
    }

    /// Build compact adjacency lists: for each node, collect its incident vessels.
    fn build_adjacency(nodes: &[Node], vessels: &[Vessel]) -> (Vec<usize>, Vec<VesselId>) {
        let mut node_to_vessels: HashMap<NodeId, Vec<VesselId>> = HashMap::new();
        for vessel in vessels {
            node_to_vessels.entry(vessel.from).or_default().push(vessel.id);
            node_to_vessels.entry(vessel.to).or_default().push(vessel.id);
        }

        // Sort each node's list for determinism
        for list in node_to_vessels.values_mut() {
            list.sort_by_key(|v| v.index());
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut flat = Vec::new();
        offsets.push(0);

        for node in nodes {
            if let Some(list) = node_to_vessels.get(&node.id) {
                flat.extend_from_slice(list);
            }
            offsets.push(flat.len());
        }

        (offsets, flat)
    }
}
