//! Core network data structures.

use mf_core::{NodeId, VesselId};
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};
use crate::snapshot::{NetworkSnapshot, NodeSnapshot, VesselSnapshot};

/// Boundary condition attached to a node.
///
/// Flow values are signed: positive means blood is injected into the network
/// at that node, negative means it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// Internal node, mass balance only.
    #[default]
    None,
    /// Fixed pressure (Pa).
    Pressure(f64),
    /// Fixed external volume flow (m³/s).
    Flow(f64),
}

impl BoundaryCondition {
    pub fn is_boundary(&self) -> bool {
        !matches!(self, BoundaryCondition::None)
    }

    pub fn pressure(&self) -> Option<f64> {
        match self {
            BoundaryCondition::Pressure(p) => Some(*p),
            _ => None,
        }
    }

    pub fn flow(&self) -> Option<f64> {
        match self {
            BoundaryCondition::Flow(q) => Some(*q),
            _ => None,
        }
    }
}

/// A bifurcation or boundary point of the vascular graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Optional position (m), only needed by geometry-aware stimulus models.
    pub position: Option<[f64; 3]>,
    pub boundary: BoundaryCondition,
    /// Discharge hematocrit of blood entering the network here, if it is an inlet.
    pub inflow_hematocrit: Option<f64>,
    /// Solver output (Pa).
    pub(crate) pressure: f64,
}

impl Node {
    /// Current nodal pressure (Pa).
    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary.is_boundary()
    }
}

/// Hemodynamic state written back together by the flow solver.
///
/// Flow and resistance are always stored as one unit so that a resistance is
/// never observed next to a flow computed from a different hematocrit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VesselFlowState {
    /// Signed volume flow (m³/s), positive from `from` to `to`.
    pub flow: f64,
    /// Discharge hematocrit in [0, 1].
    pub hematocrit: f64,
    /// Apparent viscosity (Pa·s).
    pub viscosity: f64,
    /// Hydraulic resistance (Pa·s/m³).
    pub resistance: f64,
}

/// A vessel segment between two nodes.
///
/// The ordered pair (`from`, `to`) defines the positive flow direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Vessel {
    pub id: VesselId,
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Segment length (m), immutable.
    pub length: f64,
    /// Diameter at construction time (m), immutable, used as an adaptation bound.
    pub nominal_diameter: f64,
    pub(crate) diameter: f64,
    pub(crate) state: VesselFlowState,
}

impl Vessel {
    /// Current diameter (m).
    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn flow(&self) -> f64 {
        self.state.flow
    }

    pub fn hematocrit(&self) -> f64 {
        self.state.hematocrit
    }

    pub fn viscosity(&self) -> f64 {
        self.state.viscosity
    }

    pub fn resistance(&self) -> f64 {
        self.state.resistance
    }

    pub fn flow_state(&self) -> VesselFlowState {
        self.state
    }

    /// The node at the other end of the vessel.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.from == node { self.to } else { self.from }
    }
}

/// The network: a validated graph of nodes and vessels.
///
/// Topology, lengths, nominal diameters and boundary conditions are frozen at
/// build time. Only diameters, pressures, flows and hematocrit change
/// afterwards, through the mutators below.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) nodes: Vec<Node>,
    pub(crate) vessels: Vec<Vessel>,

    /// Offsets for node->vessel adjacency: node i's vessels are in
    /// node_vessels[node_vessel_offsets[i]..node_vessel_offsets[i+1]].
    pub(crate) node_vessel_offsets: Vec<usize>,

    /// Flat list of vessel IDs incident to nodes (sorted by node then vessel ID).
    pub(crate) node_vessels: Vec<VesselId>,
}

impl Network {
    /// Return all nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return all vessels.
    pub fn vessels(&self) -> &[Vessel] {
        &self.vessels
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn vessel_count(&self) -> usize {
        self.vessels.len()
    }

    /// Get a node by ID (returns None if ID out of bounds).
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot())
    }

    /// Get a vessel by ID (returns None if ID out of bounds).
    pub fn vessel(&self, id: VesselId) -> Option<&Vessel> {
        self.vessels.get(id.slot())
    }

    /// All vessel IDs incident to a given node.
    pub fn node_vessels(&self, node_id: NodeId) -> &[VesselId] {
        let idx = node_id.slot();
        if idx >= self.nodes.len() {
            return &[];
        }
        let start = self.node_vessel_offsets[idx];
        let end = self.node_vessel_offsets[idx + 1];
        &self.node_vessels[start..end]
    }

    pub fn degree(&self, node_id: NodeId) -> usize {
        self.node_vessels(node_id).len()
    }

    /// Nodes carrying a pressure or flow boundary condition.
    pub fn boundary_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_boundary())
    }

    /// True if at least one node fixes the pressure level.
    pub fn has_pressure_reference(&self) -> bool {
        self.nodes.iter().any(|n| n.boundary.pressure().is_some())
    }

    pub fn boundary_conditions(&self) -> Vec<BoundaryCondition> {
        self.nodes.iter().map(|n| n.boundary).collect()
    }

    pub fn pressures(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.pressure).collect()
    }

    pub fn diameters(&self) -> Vec<f64> {
        self.vessels.iter().map(|v| v.diameter).collect()
    }

    pub fn flows(&self) -> Vec<f64> {
        self.vessels.iter().map(|v| v.state.flow).collect()
    }

    pub fn hematocrits(&self) -> Vec<f64> {
        self.vessels.iter().map(|v| v.state.hematocrit).collect()
    }

    fn vessel_mut(&mut self, id: VesselId) -> NetworkResult<&mut Vessel> {
        self.vessels
            .get_mut(id.slot())
            .ok_or(NetworkError::IdNotFound { what: "VesselId" })
    }

    /// Overwrite a vessel diameter (m).
    pub fn set_diameter(&mut self, id: VesselId, diameter: f64) -> NetworkResult<()> {
        if !diameter.is_finite() || diameter <= 0.0 {
            return Err(NetworkError::Domain {
                what: "diameter",
                value: diameter,
            });
        }
        self.vessel_mut(id)?.diameter = diameter;
        Ok(())
    }

    /// Overwrite every diameter at once, in vessel order.
    pub fn set_diameters(&mut self, diameters: &[f64]) -> NetworkResult<()> {
        if diameters.len() != self.vessels.len() {
            return Err(NetworkError::Domain {
                what: "diameter vector length",
                value: diameters.len() as f64,
            });
        }
        if let Some(&bad) = diameters.iter().find(|d| !d.is_finite() || **d <= 0.0) {
            return Err(NetworkError::Domain {
                what: "diameter",
                value: bad,
            });
        }
        for (vessel, &d) in self.vessels.iter_mut().zip(diameters) {
            vessel.diameter = d;
        }
        Ok(())
    }

    /// Overwrite a nodal pressure (Pa).
    pub fn set_pressure(&mut self, id: NodeId, pressure: f64) -> NetworkResult<()> {
        if !pressure.is_finite() {
            return Err(NetworkError::Domain {
                what: "pressure",
                value: pressure,
            });
        }
        self.nodes
            .get_mut(id.slot())
            .ok_or(NetworkError::IdNotFound { what: "NodeId" })?
            .pressure = pressure;
        Ok(())
    }

    /// Overwrite every nodal pressure at once, in node order.
    pub fn set_pressures(&mut self, pressures: &[f64]) -> NetworkResult<()> {
        if pressures.len() != self.nodes.len() {
            return Err(NetworkError::Domain {
                what: "pressure vector length",
                value: pressures.len() as f64,
            });
        }
        if let Some(&bad) = pressures.iter().find(|p| !p.is_finite()) {
            return Err(NetworkError::Domain {
                what: "pressure",
                value: bad,
            });
        }
        for (node, &p) in self.nodes.iter_mut().zip(pressures) {
            node.pressure = p;
        }
        Ok(())
    }

    /// Overwrite a vessel's discharge hematocrit, keeping its flow state otherwise.
    pub fn set_hematocrit(&mut self, id: VesselId, hematocrit: f64) -> NetworkResult<()> {
        if !(0.0..=1.0).contains(&hematocrit) {
            return Err(NetworkError::Domain {
                what: "hematocrit",
                value: hematocrit,
            });
        }
        self.vessel_mut(id)?.state.hematocrit = hematocrit;
        Ok(())
    }

    /// Set the same discharge hematocrit on every vessel.
    pub fn fill_hematocrit(&mut self, hematocrit: f64) -> NetworkResult<()> {
        if !(0.0..=1.0).contains(&hematocrit) {
            return Err(NetworkError::Domain {
                what: "hematocrit",
                value: hematocrit,
            });
        }
        for vessel in &mut self.vessels {
            vessel.state.hematocrit = hematocrit;
        }
        Ok(())
    }

    /// Write back flow, hematocrit and the rheology they were computed with.
    pub fn set_flow_state(&mut self, id: VesselId, state: VesselFlowState) -> NetworkResult<()> {
        if !state.flow.is_finite() {
            return Err(NetworkError::Domain {
                what: "flow",
                value: state.flow,
            });
        }
        if !(0.0..=1.0).contains(&state.hematocrit) {
            return Err(NetworkError::Domain {
                what: "hematocrit",
                value: state.hematocrit,
            });
        }
        if !state.resistance.is_finite() || state.resistance <= 0.0 {
            return Err(NetworkError::Domain {
                what: "resistance",
                value: state.resistance,
            });
        }
        self.vessel_mut(id)?.state = state;
        Ok(())
    }

    /// Read-only copy of the mutable state, for logging and plotting.
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSnapshot {
                    id: n.id.index(),
                    name: n.name.clone(),
                    pressure: n.pressure,
                })
                .collect(),
            vessels: self
                .vessels
                .iter()
                .map(|v| VesselSnapshot {
                    id: v.id.index(),
                    name: v.name.clone(),
                    from: v.from.index(),
                    to: v.to.index(),
                    diameter: v.diameter,
                    flow: v.state.flow,
                    hematocrit: v.state.hematocrit,
                    viscosity: v.state.viscosity,
                })
                .collect(),
        }
    }
}
