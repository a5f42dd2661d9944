//! Non-linear flow solve: pressures, flows and hematocrit.
//!
//! Resistance depends on hematocrit, which depends on the flow split, which
//! depends on resistance. The inner loop alternates a linear pressure solve
//! with hematocrit propagation until the hematocrit stops moving.

use mf_core::{VesselId, max_abs_diff};
use mf_network::{BoundaryCondition, Network, VesselFlowState};
use mf_rheology::{RheologyResult, apparent_viscosity, resistance};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assemble::assemble_laplacian;
use crate::config::{ConvergenceCriterion, FlowConfig, HematocritSeed};
use crate::error::{SolverError, SolverResult};
use crate::linear::select_backend;
use crate::propagate::{NodeSplit, propagate_hematocrit};

/// Converged flow field, also written back into the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSolution {
    /// Node pressures (Pa)
    pub pressures: Vec<f64>,
    /// Signed vessel flows (m³/s)
    pub flows: Vec<f64>,
    /// Vessel discharge hematocrit
    pub hematocrits: Vec<f64>,
    /// Vessel apparent viscosity (Pa·s)
    pub viscosities: Vec<f64>,
    /// Vessel resistance (Pa·s/m³)
    pub resistances: Vec<f64>,
    /// Inner iterations taken
    pub iterations: usize,
    /// Max hematocrit change of the last inner iteration, before relaxation
    pub hematocrit_change: f64,
    /// Berg residual of the last inner iteration; none after a single iteration
    pub berg_residual: Option<f64>,
    /// Worst nodal mass imbalance relative to `total_inflow`
    pub flow_residual: f64,
    /// Worst red-cell flux imbalance at an internal node, relative to `total_inflow`
    pub rbc_residual: f64,
    /// Blood entering through the boundary (m³/s)
    pub total_inflow: f64,
    /// Split records of the last propagation
    pub splits: Vec<NodeSplit>,
    /// The flow graph had loops and was propagated by fixed-point sweeps
    pub cyclic: bool,
    /// Propagation sweeps of the last inner iteration, 1 on an acyclic flow graph
    pub propagation_sweeps: usize,
    /// Nodes with three or more outflow channels, split in proportion to flow
    pub uniform_splits: usize,
    /// Node held at 0 Pa when no pressure boundary condition exists
    pub gauge_node: Option<u32>,
    /// Linear backend used
    pub backend: String,
}

/// Progress reported during a flow solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowProgressEvent {
    IterationStarted {
        iteration: usize,
        max_iterations: usize,
    },
    IterationCompleted {
        iteration: usize,
        hematocrit_change: f64,
    },
    Converged {
        iterations: usize,
        flow_residual: f64,
    },
}

/// Solve the flow field on `network` and store it there.
pub fn solve_flow(network: &mut Network, cfg: &FlowConfig) -> SolverResult<FlowSolution> {
    solve_flow_with_progress(network, cfg, &mut |_| {})
}

/// [`solve_flow`] with a callback per inner iteration.
pub fn solve_flow_with_progress(
    network: &mut Network,
    cfg: &FlowConfig,
    on_event: &mut dyn FnMut(FlowProgressEvent),
) -> SolverResult<FlowSolution> {
    cfg.validate()?;

    let (boundary, gauge_node) = effective_boundary(network);
    if let Some(gauge) = gauge_node {
        tracing::debug!(node = gauge, "no pressure boundary condition, node used as 0 Pa gauge");
    }

    let backend = select_backend(&cfg.linear, network.node_count());
    let mut hematocrit = match cfg.seed {
        HematocritSeed::Uniform => vec![cfg.rheology.discharge_hematocrit; network.vessel_count()],
        HematocritSeed::CarryOver => network.hematocrits(),
    };

    let max_iterations = cfg.max_inner_iterations;
    let mut last_change = f64::INFINITY;
    let mut previous: Option<(Vec<f64>, Vec<f64>)> = None;
    for iteration in 1..=max_iterations {
        on_event(FlowProgressEvent::IterationStarted {
            iteration,
            max_iterations,
        });

        let rheology = vessel_rheology(network, &hematocrit, cfg)?;
        let resistances: Vec<f64> = rheology.iter().map(|(_, r)| *r).collect();
        let laplacian = assemble_laplacian(network, &resistances)?;
        let pressures = backend.solve(&laplacian, &boundary)?;
        let flows: Vec<f64> = network
            .vessels()
            .iter()
            .zip(&resistances)
            .map(|(v, r)| (pressures[v.from.slot()] - pressures[v.to.slot()]) / r)
            .collect();

        let propagation = propagate_hematocrit(network, &flows, &pressures, &hematocrit, cfg)?;
        // Change before relaxation
        last_change = max_abs_diff(&hematocrit, &propagation.hematocrit);
        let relaxed: Vec<f64> = hematocrit
            .iter()
            .zip(&propagation.hematocrit)
            .map(|(old, new)| (old + cfg.relaxation * (new - old)).clamp(0.0, 1.0))
            .collect();

        let berg = previous.as_ref().map(|(p_old, q_old)| {
            let iterate = Balance::new(network, &flows, &hematocrit, &boundary);
            let red_cell_inflow = cfg.rheology.discharge_hematocrit * iterate.total_inflow;
            let leakage = if red_cell_inflow > 0.0 {
                iterate.rbc_leakage / red_cell_inflow
            } else {
                iterate.rbc_leakage
            };
            leakage
                + relative_change(&pressures, p_old)
                + relative_change(&flows, q_old)
                + relative_change(&relaxed, &hematocrit)
        });

        tracing::debug!(
            iteration,
            hematocrit_change = last_change,
            berg_residual = berg,
            cyclic = propagation.cyclic,
            "flow inner iteration"
        );
        on_event(FlowProgressEvent::IterationCompleted {
            iteration,
            hematocrit_change: last_change,
        });

        let converged = match cfg.convergence {
            ConvergenceCriterion::HematocritChange => last_change < cfg.hematocrit_tolerance,
            ConvergenceCriterion::Berg => berg.is_some_and(|r| r <= cfg.berg_tolerance),
        };
        if !converged {
            hematocrit = relaxed;
            previous = Some((pressures, flows));
            continue;
        }

        // The propagated field is the one consistent with the final flows
        let hematocrit = propagation.hematocrit;
        let balance = Balance::new(network, &flows, &hematocrit, &boundary);
        if balance.flow_residual > cfg.residual_tolerance {
            return Err(SolverError::ConvergenceFailed {
                what: format!(
                    "nodal mass imbalance {:e} exceeds tolerance {:e}",
                    balance.flow_residual, cfg.residual_tolerance
                ),
            });
        }

        network.set_pressures(&pressures)?;
        for (k, &(viscosity, resistance)) in rheology.iter().enumerate() {
            network.set_flow_state(
                VesselId::from_index(k as u32),
                VesselFlowState {
                    flow: flows[k],
                    hematocrit: hematocrit[k],
                    viscosity,
                    resistance,
                },
            )?;
        }

        tracing::info!(
            iterations = iteration,
            flow_residual = balance.flow_residual,
            rbc_residual = balance.rbc_residual,
            backend = backend.name(),
            "flow solve converged"
        );
        on_event(FlowProgressEvent::Converged {
            iterations: iteration,
            flow_residual: balance.flow_residual,
        });

        return Ok(FlowSolution {
            pressures,
            flows,
            hematocrits: hematocrit,
            viscosities: rheology.iter().map(|(mu, _)| *mu).collect(),
            resistances,
            iterations: iteration,
            hematocrit_change: last_change,
            berg_residual: berg,
            flow_residual: balance.flow_residual,
            rbc_residual: balance.rbc_residual,
            total_inflow: balance.total_inflow,
            splits: propagation.splits,
            cyclic: propagation.cyclic,
            propagation_sweeps: propagation.sweeps,
            uniform_splits: propagation.uniform_splits,
            gauge_node,
            backend: backend.name().to_string(),
        });
    }

    Err(SolverError::ConvergenceFailed {
        what: format!(
            "inner loop not converged after {max_iterations} iterations (last hematocrit change {last_change:e}, {:?})",
            cfg.convergence
        ),
    })
}

/// Boundary conditions handed to the linear solve.
///
/// Flow-only boundaries leave the pressure level free; the first flow node
/// is then held at 0 Pa. Its prescribed flow follows from the others.
fn effective_boundary(network: &Network) -> (Vec<BoundaryCondition>, Option<u32>) {
    let mut boundary = network.boundary_conditions();
    if network.has_pressure_reference() {
        return (boundary, None);
    }
    let gauge = boundary.iter().position(|bc| bc.flow().is_some());
    if let Some(i) = gauge {
        boundary[i] = BoundaryCondition::Pressure(0.0);
    }
    (boundary, gauge.map(|i| i as u32))
}

/// Apparent viscosity and resistance of every vessel, evaluated in parallel.
fn vessel_rheology(
    network: &Network,
    hematocrit: &[f64],
    cfg: &FlowConfig,
) -> SolverResult<Vec<(f64, f64)>> {
    let out = network
        .vessels()
        .par_iter()
        .zip(hematocrit.par_iter())
        .map(|(vessel, &h)| -> RheologyResult<(f64, f64)> {
            let mu = apparent_viscosity(&cfg.rheology, vessel.diameter(), h)?;
            let r = resistance(vessel.diameter(), vessel.length, mu)?;
            Ok((mu, r))
        })
        .collect::<RheologyResult<Vec<_>>>()?;
    Ok(out)
}

/// Mass and red-cell balance of a flow field.
struct Balance {
    flow_residual: f64,
    rbc_residual: f64,
    /// Sum of absolute red-cell imbalances at internal nodes (m³/s)
    rbc_leakage: f64,
    total_inflow: f64,
}

impl Balance {
    fn new(
        network: &Network,
        flows: &[f64],
        hematocrit: &[f64],
        boundary: &[BoundaryCondition],
    ) -> Self {
        let n = network.node_count();
        let mut net_out = vec![0.0; n];
        let mut rbc_out = vec![0.0; n];
        for (k, v) in network.vessels().iter().enumerate() {
            let q = flows[k];
            net_out[v.from.slot()] += q;
            net_out[v.to.slot()] -= q;
            rbc_out[v.from.slot()] += q * hematocrit[k];
            rbc_out[v.to.slot()] -= q * hematocrit[k];
        }

        let mut total_inflow = 0.0;
        let mut worst_flow: f64 = 0.0;
        let mut worst_rbc: f64 = 0.0;
        let mut rbc_leakage = 0.0;
        for (i, bc) in boundary.iter().enumerate() {
            match bc {
                BoundaryCondition::None => {
                    worst_flow = worst_flow.max(net_out[i].abs());
                    worst_rbc = worst_rbc.max(rbc_out[i].abs());
                    rbc_leakage += rbc_out[i].abs();
                }
                BoundaryCondition::Flow(q_ext) => {
                    worst_flow = worst_flow.max((net_out[i] - q_ext).abs());
                    total_inflow += net_out[i].max(0.0);
                }
                // Includes the gauge node, whose flow is implied by the others
                BoundaryCondition::Pressure(_) => {
                    total_inflow += net_out[i].max(0.0);
                }
            }
        }

        let scale = if total_inflow > 0.0 { total_inflow } else { 1.0 };
        Self {
            flow_residual: worst_flow / scale,
            rbc_residual: worst_rbc / scale,
            rbc_leakage,
            total_inflow,
        }
    }

}

/// ‖new - old‖ / ‖new‖, or the plain difference norm when `new` is zero.
fn relative_change(new: &[f64], old: &[f64]) -> f64 {
    let diff = new
        .iter()
        .zip(old)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    let scale = new.iter().map(|a| a * a).sum::<f64>().sqrt();
    if scale > 0.0 { diff / scale } else { diff }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::units::{m3ps, pa, um};
    use mf_network::NetworkBuilder;
    use mf_rheology::RheologyConfig;

    fn newtonian() -> FlowConfig {
        FlowConfig {
            rheology: RheologyConfig::newtonian(1e-3),
            ..FlowConfig::default()
        }
    }

    #[test]
    fn flow_only_boundaries_use_a_gauge_node() {
        let mut b = NetworkBuilder::new();
        let n0 = b.add_node("in");
        let n1 = b.add_node("mid");
        let n2 = b.add_node("out");
        b.add_vessel("a", n0, n1, um(100.0), um(10.0));
        b.add_vessel("b", n1, n2, um(100.0), um(10.0));
        b.set_flow_bc(n0, m3ps(1e-12));
        b.set_flow_bc(n2, m3ps(-1e-12));
        let mut net = b.build().unwrap();

        let sol = solve_flow(&mut net, &newtonian()).unwrap();
        assert_eq!(sol.gauge_node, Some(0));
        assert_eq!(sol.pressures[0], 0.0);
        for q in &sol.flows {
            assert!((q - 1e-12).abs() < 1e-21);
        }
        assert!(sol.pressures[2] < sol.pressures[1]);
    }

    #[test]
    fn progress_events_bracket_each_iteration() {
        let mut b = NetworkBuilder::new();
        let n0 = b.add_node("in");
        let n1 = b.add_node("out");
        b.add_vessel("a", n0, n1, um(100.0), um(10.0));
        b.set_pressure_bc(n0, pa(100.0));
        b.set_pressure_bc(n1, pa(0.0));
        let mut net = b.build().unwrap();

        let mut events = Vec::new();
        let sol = solve_flow_with_progress(&mut net, &newtonian(), &mut |e| events.push(e)).unwrap();
        assert_eq!(events.len(), 2 * sol.iterations + 1);
        assert!(matches!(
            events.first(),
            Some(FlowProgressEvent::IterationStarted { iteration: 1, .. })
        ));
        assert!(matches!(
            events.last(),
            Some(FlowProgressEvent::Converged { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_solving() {
        let mut b = NetworkBuilder::new();
        let n0 = b.add_node("in");
        let n1 = b.add_node("out");
        b.add_vessel("a", n0, n1, um(100.0), um(10.0));
        b.set_pressure_bc(n0, pa(100.0));
        b.set_pressure_bc(n1, pa(0.0));
        let mut net = b.build().unwrap();
        let cfg = FlowConfig {
            max_inner_iterations: 0,
            ..newtonian()
        };
        assert!(matches!(
            solve_flow(&mut net, &cfg),
            Err(SolverError::InvalidConfig { .. })
        ));
    }
}
