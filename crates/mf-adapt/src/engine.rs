//! Adaptation runner: flow solve, stimuli, diameter update, repeat.

use mf_network::{Network, NetworkSnapshot};
use mf_solver::{FlowConfig, FlowSolution, HematocritSeed, solve_flow};
use serde::{Deserialize, Serialize};

use crate::config::{AdaptationConfig, IntegratorType};
use crate::error::{AdaptError, AdaptResult};
use crate::integrator::{DiameterModel, ForwardEuler, Heun, Integrator};
use crate::stimulus::{VesselStimulus, compute_stimuli};

/// How an adaptation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationStatus {
    /// Max relative diameter change fell below ε_d.
    Converged,
    /// The step cap was reached first.
    StepLimit,
}

/// Final state of an adaptation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationOutcome {
    pub status: AdaptationStatus,
    pub steps_taken: usize,
    /// Max relative diameter change of the last step.
    pub max_relative_change: f64,
    /// Final diameters (m)
    pub diameters: Vec<f64>,
    /// Flow field on the final diameters
    pub flow: FlowSolution,
    /// Stimuli on the final diameters
    pub stimuli: Vec<VesselStimulus>,
    /// Snapshots kept every `record_every` steps
    pub history: Vec<NetworkSnapshot>,
}

impl AdaptationOutcome {
    pub fn converged(&self) -> bool {
        self.status == AdaptationStatus::Converged
    }
}

/// Progress after each completed step.
///
/// The snapshot holds the updated diameters next to the flow field they
/// were computed from.
#[derive(Debug, Clone)]
pub struct AdaptationProgress {
    pub step: usize,
    pub max_steps: usize,
    pub max_relative_change: f64,
    /// Inner flow iterations of the step's first solve
    pub flow_iterations: usize,
    pub snapshot: NetworkSnapshot,
}

/// Result of a single step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Flow field on the diameters the step started from
    pub flow: FlowSolution,
    pub stimuli: Vec<VesselStimulus>,
    pub old_diameters: Vec<f64>,
    pub new_diameters: Vec<f64>,
    pub max_relative_change: f64,
}

/// Couples the network to the integrators: rates come from a full flow solve.
struct NetworkModel<'a> {
    network: &'a mut Network,
    flow_cfg: &'a FlowConfig,
    cfg: &'a AdaptationConfig,
    nominal: Vec<f64>,
    first: Option<(FlowSolution, Vec<VesselStimulus>)>,
}

impl DiameterModel for NetworkModel<'_> {
    fn rates(&mut self, d: &[f64]) -> AdaptResult<Vec<f64>> {
        self.network.set_diameters(d)?;
        let flow = solve_flow(self.network, self.flow_cfg)?;
        let stimuli = compute_stimuli(self.network, &flow, &self.cfg.weights)?;
        let rates = stimuli.iter().zip(d).map(|(s, di)| s.total * di).collect();
        if self.first.is_none() {
            self.first = Some((flow, stimuli));
        }
        Ok(rates)
    }

    fn project(&self, d: Vec<f64>) -> Vec<f64> {
        d.into_iter()
            .zip(&self.nominal)
            .map(|(di, &nominal)| {
                let (lo, hi) = self.cfg.bounds(nominal);
                di.min(hi).max(lo)
            })
            .collect()
    }
}

/// One adaptation step on `network`: solve, compute stimuli, move diameters.
pub fn adapt_step(
    network: &mut Network,
    flow_cfg: &FlowConfig,
    cfg: &AdaptationConfig,
) -> AdaptResult<StepReport> {
    cfg.validate()?;
    step(network, flow_cfg, cfg)
}

fn step(network: &mut Network, flow_cfg: &FlowConfig, cfg: &AdaptationConfig) -> AdaptResult<StepReport> {
    let old = network.diameters();
    let result = integrate(network, flow_cfg, cfg, old.clone());
    if result.is_err() {
        // Rate evaluations may have left predictor diameters behind
        network.set_diameters(&old)?;
    }
    result
}

fn integrate(
    network: &mut Network,
    flow_cfg: &FlowConfig,
    cfg: &AdaptationConfig,
    old: Vec<f64>,
) -> AdaptResult<StepReport> {
    let nominal = network.vessels().iter().map(|v| v.nominal_diameter).collect();
    let mut model = NetworkModel {
        network,
        flow_cfg,
        cfg,
        nominal,
        first: None,
    };

    let raw = match cfg.integrator {
        IntegratorType::ForwardEuler => ForwardEuler.step(&mut model, &old, cfg.time_step)?,
        IntegratorType::Heun => Heun.step(&mut model, &old, cfg.time_step)?,
    };
    if let Some((k, &bad)) = raw.iter().enumerate().find(|(_, d)| !d.is_finite()) {
        return Err(AdaptError::Domain {
            what: format!("diameter of vessel {k} after integration"),
            value: bad,
        });
    }
    let new = model.project(raw);
    if let Some((k, &bad)) = new.iter().enumerate().find(|(_, d)| **d <= 0.0) {
        return Err(AdaptError::Domain {
            what: format!("diameter of vessel {k} is non-positive after clamping"),
            value: bad,
        });
    }

    let (flow, stimuli) = model.first.take().ok_or(AdaptError::InvalidArg {
        what: "integrator evaluated no rates",
    })?;
    network.set_diameters(&new)?;

    let max_relative_change = old
        .iter()
        .zip(&new)
        .map(|(a, b)| (b - a).abs() / a)
        .fold(0.0, f64::max);

    Ok(StepReport {
        flow,
        stimuli,
        old_diameters: old,
        new_diameters: new,
        max_relative_change,
    })
}

/// Adapt until steady state or the step cap.
pub fn run_adaptation(
    network: &mut Network,
    flow_cfg: &FlowConfig,
    cfg: &AdaptationConfig,
) -> AdaptResult<AdaptationOutcome> {
    run_adaptation_with_progress(network, flow_cfg, cfg, &mut |_| {})
}

/// [`run_adaptation`] with a callback after every step.
pub fn run_adaptation_with_progress(
    network: &mut Network,
    flow_cfg: &FlowConfig,
    cfg: &AdaptationConfig,
    on_progress: &mut dyn FnMut(&AdaptationProgress),
) -> AdaptResult<AdaptationOutcome> {
    cfg.validate()?;
    flow_cfg.validate()?;

    let mut flow_cfg = flow_cfg.clone();
    let mut history = Vec::new();
    let mut status = AdaptationStatus::StepLimit;
    let mut steps_taken = 0;
    let mut last_change = f64::INFINITY;

    for n in 1..=cfg.max_steps {
        let report = step(network, &flow_cfg, cfg)?;
        if cfg.carry_over_hematocrit {
            flow_cfg.seed = HematocritSeed::CarryOver;
        }
        steps_taken = n;
        last_change = report.max_relative_change;

        tracing::debug!(
            step = n,
            max_relative_change = last_change,
            flow_iterations = report.flow.iterations,
            "adaptation step"
        );

        let snapshot = network.snapshot();
        if cfg.record_every > 0 && n % cfg.record_every == 0 {
            history.push(snapshot.clone());
        }
        on_progress(&AdaptationProgress {
            step: n,
            max_steps: cfg.max_steps,
            max_relative_change: last_change,
            flow_iterations: report.flow.iterations,
            snapshot,
        });

        if last_change < cfg.diameter_tolerance {
            status = AdaptationStatus::Converged;
            break;
        }
    }

    let flow = solve_flow(network, &flow_cfg)?;
    let stimuli = compute_stimuli(network, &flow, &cfg.weights)?;

    match status {
        AdaptationStatus::Converged => tracing::info!(
            steps = steps_taken,
            max_relative_change = last_change,
            "adaptation reached steady state"
        ),
        AdaptationStatus::StepLimit => tracing::warn!(
            steps = steps_taken,
            max_relative_change = last_change,
            "adaptation stopped at the step cap"
        ),
    }

    Ok(AdaptationOutcome {
        status,
        steps_taken,
        max_relative_change: last_change,
        diameters: network.diameters(),
        flow,
        stimuli,
        history,
    })
}
