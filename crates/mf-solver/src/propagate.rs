//! Red-cell transport along the flow direction.
//!
//! Each node mixes what flows in and hands the mixture to what flows out,
//! through the phase-separation law when there is more than one way out.
//! Boundary nodes exchange blood with the outside through a ghost channel:
//! external inflow joins the mixture, external outflow competes as a daughter.

use std::collections::VecDeque;

use mf_network::Network;
use mf_rheology::{MixInput, SplitInput, SplitRecord, mix, phase_separation};
use serde::{Deserialize, Serialize};

use crate::config::FlowConfig;
use crate::error::{SolverError, SolverResult};

/// Phase-separation outcome at one diverging node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSplit {
    /// Node index.
    pub node: u32,
    /// Daughters in vessel order, the external outflow last when present.
    pub record: SplitRecord,
}

#[derive(Debug, Clone)]
pub(crate) struct Propagation {
    pub hematocrit: Vec<f64>,
    pub splits: Vec<NodeSplit>,
    /// The active flow graph contained a directed cycle.
    pub cyclic: bool,
    /// Fixed-point sweeps used on a cyclic graph, 1 otherwise.
    pub sweeps: usize,
    /// Nodes with three or more outflow channels.
    pub uniform_splits: usize,
}

/// Flow-directed view of the network for one flow field.
struct FlowGraph {
    /// Active vessels entering / leaving each node.
    inflow: Vec<Vec<usize>>,
    outflow: Vec<Vec<usize>>,
    /// Net external inflow at boundary nodes, 0 elsewhere (m³/s).
    external: Vec<f64>,
    magnitude: Vec<f64>,
    active: Vec<bool>,
}

impl FlowGraph {
    fn new(network: &Network, flows: &[f64], threshold: f64) -> Self {
        let n = network.node_count();
        let mut inflow = vec![Vec::new(); n];
        let mut outflow = vec![Vec::new(); n];
        let mut net_out = vec![0.0; n];
        let mut active = vec![false; flows.len()];
        let magnitude: Vec<f64> = flows.iter().map(|q| q.abs()).collect();

        for (v, vessel) in network.vessels().iter().enumerate() {
            let q = flows[v];
            if q.abs() <= threshold {
                continue;
            }
            active[v] = true;
            let (up, down) = if q > 0.0 {
                (vessel.from.slot(), vessel.to.slot())
            } else {
                (vessel.to.slot(), vessel.from.slot())
            };
            outflow[up].push(v);
            inflow[down].push(v);
            net_out[up] += q.abs();
            net_out[down] -= q.abs();
        }

        let external = network
            .nodes()
            .iter()
            .zip(&net_out)
            .map(|(node, &ext)| {
                if node.is_boundary() && ext.abs() > threshold {
                    ext
                } else {
                    0.0
                }
            })
            .collect();

        Self {
            inflow,
            outflow,
            external,
            magnitude,
            active,
        }
    }

    /// Kahn order over nodes; `None` when the active graph has a cycle.
    fn topological_order(&self) -> Option<Vec<usize>> {
        let n = self.inflow.len();
        let mut indegree: Vec<usize> = self.inflow.iter().map(Vec::len).collect();
        let mut downstream = vec![usize::MAX; self.active.len()];
        for (node, entering) in self.inflow.iter().enumerate() {
            for &v in entering {
                downstream[v] = node;
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &v in &self.outflow[i] {
                let j = downstream[v];
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }
        (order.len() == n).then_some(order)
    }
}

/// Propagate discharge hematocrit for a given flow field.
///
/// `previous` seeds the vessels of a cyclic flow graph; it is ignored on an
/// acyclic one. Vessels carrying no flow get hematocrit 0.
pub(crate) fn propagate_hematocrit(
    network: &Network,
    flows: &[f64],
    pressures: &[f64],
    previous: &[f64],
    cfg: &FlowConfig,
) -> SolverResult<Propagation> {
    let q_max = flows.iter().map(|q| q.abs()).fold(0.0, f64::max);
    let graph = FlowGraph::new(network, flows, cfg.zero_flow_tolerance * q_max);

    let mut hematocrit: Vec<f64> = previous
        .iter()
        .zip(&graph.active)
        .map(|(&h, &on)| if on { h } else { 0.0 })
        .collect();

    if let Some(order) = graph.topological_order() {
        let (splits, uniform_splits) = sweep(network, &graph, &order, &mut hematocrit, cfg)?;
        return Ok(Propagation {
            hematocrit,
            splits,
            cyclic: false,
            sweeps: 1,
            uniform_splits,
        });
    }

    // Flow loops: iterate in decreasing-pressure order until nothing moves
    let mut order: Vec<usize> = (0..network.node_count()).collect();
    order.sort_by(|&a, &b| pressures[b].total_cmp(&pressures[a]));

    for sweeps in 1..=cfg.max_propagation_sweeps {
        let before = hematocrit.clone();
        let (splits, uniform_splits) = sweep(network, &graph, &order, &mut hematocrit, cfg)?;
        let change = mf_core::max_abs_diff(&before, &hematocrit);
        tracing::trace!(sweeps, change, "cyclic hematocrit sweep");
        if change < cfg.hematocrit_tolerance {
            tracing::debug!(sweeps, "cyclic flow graph, hematocrit fixed point reached");
            return Ok(Propagation {
                hematocrit,
                splits,
                cyclic: true,
                sweeps,
                uniform_splits,
            });
        }
    }

    Err(SolverError::ConvergenceFailed {
        what: format!(
            "hematocrit propagation on a cyclic flow graph did not settle in {} sweeps",
            cfg.max_propagation_sweeps
        ),
    })
}

/// One pass over `order`, writing the hematocrit of every outflow vessel.
fn sweep(
    network: &Network,
    graph: &FlowGraph,
    order: &[usize],
    hematocrit: &mut [f64],
    cfg: &FlowConfig,
) -> SolverResult<(Vec<NodeSplit>, usize)> {
    let vessels = network.vessels();
    let nodes = network.nodes();
    let mut splits = Vec::new();
    let mut uniform_splits = 0;

    for &i in order {
        let out = &graph.outflow[i];
        let ext = graph.external[i];
        if out.is_empty() && ext >= 0.0 {
            continue;
        }

        let mut streams: Vec<MixInput> = graph.inflow[i]
            .iter()
            .map(|&v| MixInput {
                flow: graph.magnitude[v],
                hematocrit: hematocrit[v],
            })
            .collect();
        if ext > 0.0 {
            streams.push(MixInput {
                flow: ext,
                hematocrit: nodes[i]
                    .inflow_hematocrit
                    .unwrap_or(cfg.rheology.discharge_hematocrit),
            });
        }
        let parent_hematocrit = mix(&streams)?;

        let mean_out_diameter = (!out.is_empty()).then(|| {
            out.iter().map(|&v| vessels[v].diameter()).sum::<f64>() / out.len() as f64
        });
        let parent_diameter = graph.inflow[i]
            .iter()
            .copied()
            .max_by(|&a, &b| graph.magnitude[a].total_cmp(&graph.magnitude[b]))
            .map(|v| vessels[v].diameter())
            .or(mean_out_diameter)
            .unwrap_or(0.0);

        let mut flows: Vec<f64> = out.iter().map(|&v| graph.magnitude[v]).collect();
        let mut diameters: Vec<f64> = out.iter().map(|&v| vessels[v].diameter()).collect();
        if ext < 0.0 {
            flows.push(-ext);
            diameters.push(mean_out_diameter.unwrap_or(parent_diameter));
        }

        if flows.len() == 1 {
            if let Some(&v) = out.first() {
                hematocrit[v] = parent_hematocrit;
            }
            continue;
        }

        let parent_flow: f64 = flows.iter().sum();
        let record = phase_separation(
            &cfg.rheology,
            &SplitInput {
                parent_flow,
                parent_hematocrit,
                parent_diameter,
                daughter_diameters: &diameters,
                flow_fractions: &flows,
            },
        )?;
        if flows.len() > 2 {
            uniform_splits += 1;
        }
        for (&v, &h) in out.iter().zip(&record.hematocrits) {
            hematocrit[v] = h;
        }
        splits.push(NodeSplit {
            node: nodes[i].id.index(),
            record,
        });
    }
    Ok((splits, uniform_splits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::units::{pa, um};
    use mf_network::{BoundaryCondition, NetworkBuilder};
    use mf_rheology::{PhaseSeparationLaw, RheologyConfig};

    fn proportional() -> FlowConfig {
        FlowConfig {
            rheology: RheologyConfig {
                phase_separation: PhaseSeparationLaw::Proportional,
                ..RheologyConfig::default()
            },
            ..FlowConfig::default()
        }
    }

    /// in -> b, triangle b -> c -> e -> b, c -> out.
    fn loop_network() -> Network {
        let mut b = NetworkBuilder::new();
        let a = b.add_node("in");
        let nb = b.add_node("b");
        let c = b.add_node("c");
        let e = b.add_node("e");
        let d = b.add_node("out");
        b.add_vessel("ab", a, nb, um(100.0), um(10.0));
        b.add_vessel("bc", nb, c, um(100.0), um(10.0));
        b.add_vessel("ce", c, e, um(100.0), um(10.0));
        b.add_vessel("eb", e, nb, um(100.0), um(10.0));
        b.add_vessel("cd", c, d, um(100.0), um(10.0));
        b.set_pressure_bc(a, pa(100.0));
        b.set_pressure_bc(d, pa(0.0));
        b.build().unwrap()
    }

    #[test]
    fn cyclic_flow_reaches_a_fixed_point() {
        let net = loop_network();
        let flows = [1.0, 2.0, 1.0, 1.0, 1.0];
        let pressures = [100.0, 60.0, 40.0, 50.0, 0.0];
        let out = propagate_hematocrit(&net, &flows, &pressures, &[0.0; 5], &proportional())
            .unwrap();
        assert!(out.cyclic);
        assert!(out.sweeps > 1);
        for h in &out.hematocrit {
            assert!((h - 0.45).abs() < 1e-5, "{h}");
        }
    }

    #[test]
    fn cyclic_flow_with_tiny_sweep_budget_fails() {
        let net = loop_network();
        let flows = [1.0, 2.0, 1.0, 1.0, 1.0];
        let pressures = [100.0, 60.0, 40.0, 50.0, 0.0];
        let cfg = FlowConfig {
            max_propagation_sweeps: 2,
            ..proportional()
        };
        assert!(matches!(
            propagate_hematocrit(&net, &flows, &pressures, &[0.0; 5], &cfg),
            Err(SolverError::ConvergenceFailed { .. })
        ));
    }

    #[test]
    fn boundary_outflow_competes_as_a_daughter() {
        // Pressure-fixed midpoint drains half the flow to the outside
        let mut b = NetworkBuilder::new();
        let a = b.add_node("in");
        let m = b.add_node("mid");
        let d = b.add_node("out");
        b.add_vessel("am", a, m, um(100.0), um(10.0));
        b.add_vessel("md", m, d, um(100.0), um(10.0));
        b.set_boundary(a, BoundaryCondition::Flow(2.0));
        b.set_pressure_bc(m, pa(10.0));
        b.set_pressure_bc(d, pa(0.0));
        b.set_inflow_hematocrit(a, 0.3);
        let net = b.build().unwrap();

        let out = propagate_hematocrit(
            &net,
            &[2.0, 1.0],
            &[20.0, 10.0, 0.0],
            &[0.0; 2],
            &proportional(),
        )
        .unwrap();
        assert!(!out.cyclic);
        assert!((out.hematocrit[0] - 0.3).abs() < 1e-12);
        assert!((out.hematocrit[1] - 0.3).abs() < 1e-12);
        assert_eq!(out.splits.len(), 1);
        assert_eq!(out.splits[0].node, m.index());
        assert_eq!(out.splits[0].record.hematocrits.len(), 2);
    }

    #[test]
    fn zero_flow_vessel_carries_no_red_cells() {
        let net = loop_network();
        let flows = [1.0, 1.0, 0.0, 0.0, 1.0];
        let pressures = [100.0, 60.0, 40.0, 40.0, 0.0];
        let out =
            propagate_hematocrit(&net, &flows, &pressures, &[0.45; 5], &proportional()).unwrap();
        assert_eq!(out.hematocrit[2], 0.0);
        assert_eq!(out.hematocrit[3], 0.0);
        assert!((out.hematocrit[4] - 0.45).abs() < 1e-12);
    }
}
