//! Mechanobiological stimuli per vessel.
//!
//! The total stimulus combines a shear term, a pressure term, a metabolic term
//! with its upstream-conducted response, and a constant shrinking tendency:
//!
//! ```text
//! S = k_wss·log10(τ + τ_ref) − k_p·log10(τ_e(P))
//!   + k_m·(log10(Q_ref / (Q·H) + 1) + k_c·J / (J + J0)) − k_s
//! ```
//!
//! τ is wall shear stress in dyn/cm², P the mean transmural pressure in mmHg
//! and Q·H the red-cell flux in nl/min.

use mf_core::units::constants::{DYN_PER_CM2_PER_PA, NL_PER_MIN_PER_M3PS, PA_PER_MMHG};
use mf_network::Network;
use mf_rheology::wall_shear_stress;
use mf_solver::FlowSolution;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::StimulusWeights;
use crate::error::{AdaptError, AdaptResult};

/// Red-cell flux floor, as a fraction of `q_ref`, for vessels without flow.
const MIN_RBC_FLUX_FRACTION: f64 = 1e-6;

/// Stimulus terms of one vessel, already weighted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VesselStimulus {
    pub shear: f64,
    pub pressure: f64,
    pub metabolic: f64,
    pub conducted: f64,
    pub shrinking: f64,
    /// Sum of the terms with their signs; dD/dt = total · D.
    pub total: f64,
    /// Wall shear stress (dyn/cm²).
    pub wall_shear_stress: f64,
    /// Conducted signal J at the upstream end.
    pub conducted_signal: f64,
}

/// Wall shear stress (dyn/cm²) a vessel at pressure `p_mmhg` is set to maintain.
///
/// Valid for pressures of at least 10 mmHg.
pub fn pressure_set_point(p_mmhg: f64) -> f64 {
    100.0 - 86.0 * (-5000.0 * p_mmhg.log10().log10().powf(5.4)).exp()
}

/// Per-vessel quantities that need no neighbour information.
struct Local {
    tau: f64,
    pressure_mmhg: f64,
    floored: bool,
    metabolic_signal: f64,
}

/// Stimuli for every vessel of `network` under the flow field `flow`.
pub fn compute_stimuli(
    network: &Network,
    flow: &FlowSolution,
    weights: &StimulusWeights,
) -> AdaptResult<Vec<VesselStimulus>> {
    if flow.flows.len() != network.vessel_count() || flow.pressures.len() != network.node_count() {
        return Err(AdaptError::InvalidArg {
            what: "flow solution does not match the network",
        });
    }

    let local = network
        .vessels()
        .par_iter()
        .enumerate()
        .map(|(k, v)| -> AdaptResult<Local> {
            let q = flow.flows[k];
            let tau = wall_shear_stress(v.diameter(), flow.viscosities[k], q)? * DYN_PER_CM2_PER_PA;
            let p = 0.5 * (flow.pressures[v.from.slot()] + flow.pressures[v.to.slot()]) / PA_PER_MMHG
                - weights.external_pressure;
            let rbc_flux = (q.abs() * flow.hematocrits[k] * NL_PER_MIN_PER_M3PS)
                .max(weights.q_ref * MIN_RBC_FLUX_FRACTION);
            Ok(Local {
                tau,
                pressure_mmhg: p.max(weights.min_pressure),
                floored: p < weights.min_pressure,
                metabolic_signal: (weights.q_ref / rbc_flux + 1.0).log10(),
            })
        })
        .collect::<AdaptResult<Vec<_>>>()?;

    let floored = local.iter().filter(|l| l.floored).count();
    if floored > 0 {
        tracing::warn!(
            vessels = floored,
            floor_mmhg = weights.min_pressure,
            "transmural pressure below the stimulus law's range, floored"
        );
    }

    let signal = conducted_signal(network, flow, &local, weights.l_ref);

    local
        .iter()
        .zip(&signal)
        .enumerate()
        .map(|(k, (l, &j))| {
            let shear = weights.k_wss * (l.tau + weights.tau_ref).log10();
            let pressure = weights.k_p * pressure_set_point(l.pressure_mmhg).log10();
            let metabolic = weights.k_m * l.metabolic_signal;
            let conducted = weights.k_m * weights.k_c * j / (j + weights.j0);
            let shrinking = weights.k_s;
            let total = shear - pressure + metabolic + conducted - shrinking;
            if !total.is_finite() {
                return Err(AdaptError::Domain {
                    what: format!("stimulus of vessel {}", network.vessels()[k].name),
                    value: total,
                });
            }
            Ok(VesselStimulus {
                shear,
                pressure,
                metabolic,
                conducted,
                shrinking,
                total,
                wall_shear_stress: l.tau,
                conducted_signal: j,
            })
        })
        .collect()
}

/// Metabolic signal carried upstream with exponential decay over vessel length.
///
/// Flow runs from high to low pressure, so visiting vessels by increasing
/// upstream pressure sees every downstream vessel first.
fn conducted_signal(network: &Network, flow: &FlowSolution, local: &[Local], l_ref: f64) -> Vec<f64> {
    let vessels = network.vessels();
    let upstream = |k: usize| {
        let v = &vessels[k];
        if flow.flows[k] >= 0.0 { v.from } else { v.to }
    };
    let downstream = |k: usize| vessels[k].other_end(upstream(k));

    let mut order: Vec<usize> = (0..vessels.len()).collect();
    order.sort_by(|&a, &b| {
        flow.pressures[upstream(a).slot()].total_cmp(&flow.pressures[upstream(b).slot()])
    });

    let mut signal = vec![0.0; vessels.len()];
    for &k in &order {
        let mut incoming = 0.0;
        if flow.flows[k] != 0.0 {
            let node = downstream(k);
            for &vid in network.node_vessels(node) {
                let j = vid.slot();
                if j != k && flow.flows[j] != 0.0 && upstream(j) == node {
                    incoming += signal[j];
                }
            }
        }
        let decay = (-vessels[k].length / l_ref).exp();
        signal[k] = local[k].metabolic_signal + decay * incoming;
    }
    signal
}
