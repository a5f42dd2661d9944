//! Network validation logic.

use std::collections::HashSet;

use mf_core::{NodeId, VesselId};

use crate::error::{NetworkError, NetworkResult};
use crate::graph::{BoundaryCondition, Node, Vessel};

/// Relative tolerance on the net prescribed flow when no pressure is fixed.
const FLOW_BALANCE_REL_TOL: f64 = 1e-9;

/// Validate references, geometry and duplicate vessels.
pub(crate) fn validate_structure(nodes: &[Node], vessels: &[Vessel]) -> NetworkResult<()> {
    if nodes.is_empty() || vessels.is_empty() {
        return Err(NetworkError::Empty);
    }

    let mut seen_pairs: HashSet<(NodeId, NodeId)> = HashSet::new();
    for vessel in vessels {
        for node in [vessel.from, vessel.to] {
            if node.slot() >= nodes.len() {
                return Err(NetworkError::InvalidNodeRef {
                    vessel: vessel.id,
                    node,
                });
            }
        }

        if vessel.from == vessel.to {
            return Err(NetworkError::SelfLoop {
                vessel: vessel.id,
                node: vessel.from,
            });
        }

        for (what, value) in [("length", vessel.length), ("diameter", vessel.diameter)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(NetworkError::NonPositiveGeometry {
                    vessel: vessel.id,
                    what,
                    value,
                });
            }
        }

        if !seen_pairs.insert((vessel.from, vessel.to)) {
            return Err(NetworkError::DuplicateVessel {
                vessel: vessel.id,
                from: vessel.from,
                to: vessel.to,
            });
        }
    }

    Ok(())
}

/// Every node must be attached and the graph must form a single component.
pub(crate) fn validate_connectivity(
    nodes: &[Node],
    vessels: &[Vessel],
    node_vessel_offsets: &[usize],
    node_vessels: &[VesselId],
) -> NetworkResult<()> {
    for node in nodes {
        let idx = node.id.slot();
        if node_vessel_offsets[idx + 1] == node_vessel_offsets[idx] {
            return Err(NetworkError::IsolatedNode { node: node.id });
        }
    }

    let components = count_components(nodes.len(), vessels, node_vessel_offsets, node_vessels);
    if components != 1 {
        return Err(NetworkError::Disconnected { components });
    }
    Ok(())
}

/// Number of connected components, by repeated depth-first search.
pub(crate) fn count_components(
    node_count: usize,
    vessels: &[Vessel],
    node_vessel_offsets: &[usize],
    node_vessels: &[VesselId],
) -> usize {
    let mut visited = vec![false; node_count];
    let mut components = 0;
    let mut stack = Vec::new();

    for start in 0..node_count {
        if visited[start] {
            continue;
        }
        components += 1;
        visited[start] = true;
        stack.push(start);
        while let Some(i) = stack.pop() {
            for vid in &node_vessels[node_vessel_offsets[i]..node_vessel_offsets[i + 1]] {
                let vessel = &vessels[vid.slot()];
                let j = vessel.other_end(NodeId::from_index(i as u32)).slot();
                if !visited[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
    }
    components
}

/// The boundary conditions must pin the flow problem down exactly.
///
/// Either at least one node fixes the pressure (the gauge), or every boundary
/// prescribes a flow and the prescribed flows balance.
pub(crate) fn validate_boundaries(nodes: &[Node]) -> NetworkResult<()> {
    let mut pressure_count = 0;
    let mut flow_count = 0;
    let mut net_flow = 0.0;
    let mut abs_flow = 0.0;

    for node in nodes {
        match node.boundary {
            BoundaryCondition::None => {}
            BoundaryCondition::Pressure(p) => {
                if !p.is_finite() {
                    return Err(NetworkError::InvalidBoundary {
                        node: node.id,
                        what: "pressure",
                        value: p,
                    });
                }
                pressure_count += 1;
            }
            BoundaryCondition::Flow(q) => {
                if !q.is_finite() {
                    return Err(NetworkError::InvalidBoundary {
                        node: node.id,
                        what: "flow",
                        value: q,
                    });
                }
                flow_count += 1;
                net_flow += q;
                abs_flow += q.abs();
            }
        }

        if let Some(h) = node.inflow_hematocrit {
            if !(0.0..=1.0).contains(&h) {
                return Err(NetworkError::InvalidBoundary {
                    node: node.id,
                    what: "inflow hematocrit",
                    value: h,
                });
            }
        }
    }

    if pressure_count + flow_count == 0 {
        return Err(NetworkError::Underdetermined {
            what: "no boundary conditions".to_string(),
        });
    }

    if pressure_count == 0 {
        if abs_flow == 0.0 {
            return Err(NetworkError::Underdetermined {
                what: "flow boundaries prescribe no flow and no pressure is fixed".to_string(),
            });
        }
        if net_flow.abs() > FLOW_BALANCE_REL_TOL * abs_flow {
            return Err(NetworkError::Overdetermined {
                what: format!(
                    "prescribed flows do not balance (net {:e} m^3/s) and no pressure is fixed",
                    net_flow
                ),
            });
        }
    }

    Ok(())
}
