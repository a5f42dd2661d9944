//! Compilation of a network description into a solvable [`Network`].

use std::collections::HashMap;

use mf_core::units::constants::{NL_PER_MIN_PER_M3PS, UM_PER_M};
use mf_core::units::{m3ps, mmhg, um};
use mf_core::{NodeId, VesselId};
use mf_network::{Network, NetworkBuilder};

use crate::ProjectResult;
use crate::schema::{BoundaryDef, NetworkDef};

/// A built network together with the file ids of its nodes and vessels.
#[derive(Debug, Clone)]
pub struct CompiledNetwork {
    pub network: Network,
    pub node_id_map: HashMap<String, NodeId>,
    pub vessel_id_map: HashMap<String, VesselId>,
}

/// Build the network described by `def`.
///
/// Expects a definition that passed [`crate::validate_project`]; dangling
/// references are still reported rather than panicking.
pub fn compile_network(def: &NetworkDef) -> ProjectResult<CompiledNetwork> {
    let mut builder = NetworkBuilder::new();
    let mut node_id_map = HashMap::new();

    for node in &def.nodes {
        let id = match node.position_um {
            Some(p) => builder.add_node_at(
                node.display_name(),
                [p[0] / UM_PER_M, p[1] / UM_PER_M, p[2] / UM_PER_M],
            ),
            None => builder.add_node(node.display_name()),
        };
        match node.boundary {
            Some(BoundaryDef::Pressure { pressure_mmhg }) => {
                builder.set_pressure_bc(id, mmhg(pressure_mmhg));
            }
            Some(BoundaryDef::Flow { flow_nl_per_min }) => {
                builder.set_flow_bc(id, m3ps(flow_nl_per_min / NL_PER_MIN_PER_M3PS));
            }
            None => {}
        }
        if let Some(h) = node.inflow_hematocrit {
            builder.set_inflow_hematocrit(id, h);
        }
        node_id_map.insert(node.id.clone(), id);
    }

    let mut vessel_id_map = HashMap::new();
    for vessel in &def.vessels {
        let lookup = |node_id: &String| {
            node_id_map
                .get(node_id)
                .copied()
                .ok_or_else(|| crate::ProjectError::Compile {
                    what: format!("vessel '{}' refers to unknown node '{}'", vessel.id, node_id),
                })
        };
        let from = lookup(&vessel.from_node_id)?;
        let to = lookup(&vessel.to_node_id)?;
        let id = builder.add_vessel(
            vessel.display_name(),
            from,
            to,
            um(vessel.length_um),
            um(vessel.diameter_um),
        );
        vessel_id_map.insert(vessel.id.clone(), id);
    }

    let network = builder.build()?;
    tracing::debug!(
        nodes = network.node_count(),
        vessels = network.vessel_count(),
        "network compiled"
    );

    Ok(CompiledNetwork {
        network,
        node_id_map,
        vessel_id_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NodeDef, VesselDef};
    use mf_core::units::constants::PA_PER_MMHG;
    use mf_network::{BoundaryCondition, NetworkError};

    fn node(id: &str, boundary: Option<BoundaryDef>) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            name: String::new(),
            position_um: None,
            boundary,
            inflow_hematocrit: None,
        }
    }

    fn vessel(id: &str, from: &str, to: &str) -> VesselDef {
        VesselDef {
            id: id.to_string(),
            name: String::new(),
            from_node_id: from.to_string(),
            to_node_id: to.to_string(),
            length_um: 250.0,
            diameter_um: 8.0,
        }
    }

    #[test]
    fn converts_to_si_units() {
        let mut inlet = node(
            "in",
            Some(BoundaryDef::Flow {
                flow_nl_per_min: 6.0,
            }),
        );
        inlet.inflow_hematocrit = Some(0.3);
        inlet.position_um = Some([100.0, 0.0, 0.0]);
        let def = NetworkDef {
            nodes: vec![
                inlet,
                node(
                    "out",
                    Some(BoundaryDef::Pressure {
                        pressure_mmhg: 15.0,
                    }),
                ),
            ],
            vessels: vec![vessel("v", "in", "out")],
        };
        let compiled = compile_network(&def).unwrap();
        let net = &compiled.network;

        let v = &net.vessels()[compiled.vessel_id_map["v"].slot()];
        assert!((v.length - 250e-6).abs() < 1e-18);
        assert!((v.diameter() - 8e-6).abs() < 1e-18);
        assert_eq!(v.name, "v");

        let inlet = &net.nodes()[compiled.node_id_map["in"].slot()];
        match inlet.boundary {
            BoundaryCondition::Flow(q) => assert!((q - 1e-13).abs() < 1e-25),
            other => panic!("unexpected boundary {other:?}"),
        }
        assert_eq!(inlet.inflow_hematocrit, Some(0.3));
        assert!((inlet.position.unwrap()[0] - 1e-4).abs() < 1e-16);

        let outlet = &net.nodes()[compiled.node_id_map["out"].slot()];
        let p = outlet.boundary.pressure().unwrap();
        assert!((p - 15.0 * PA_PER_MMHG).abs() < 1e-9);
    }

    #[test]
    fn graph_errors_come_from_the_network_builder() {
        // Two pressure nodes joined twice in the same direction
        let def = NetworkDef {
            nodes: vec![
                node(
                    "a",
                    Some(BoundaryDef::Pressure {
                        pressure_mmhg: 40.0,
                    }),
                ),
                node(
                    "b",
                    Some(BoundaryDef::Pressure {
                        pressure_mmhg: 20.0,
                    }),
                ),
            ],
            vessels: vec![vessel("v1", "a", "b"), vessel("v2", "a", "b")],
        };
        assert!(matches!(
            compile_network(&def),
            Err(crate::ProjectError::Network(
                NetworkError::DuplicateVessel { .. }
            ))
        ));
    }
}
