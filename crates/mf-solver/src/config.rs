//! Flow and linear solver configuration.

use mf_rheology::RheologyConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Linear solve strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinearSolverKind {
    /// Sparse LDLᵀ factorization.
    Direct,
    /// Aggregation AMG preconditioned conjugate gradient.
    Multigrid,
    /// Direct up to `direct_threshold` nodes, multigrid above.
    #[default]
    Auto,
}

/// Algebraic multigrid parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridConfig {
    /// Connection strength threshold θ for aggregation.
    pub strength_threshold: f64,
    pub max_levels: usize,
    /// Levels at or below this size are solved densely.
    pub coarse_size: usize,
    pub pre_smooth: usize,
    pub post_smooth: usize,
    /// Relative residual ‖b - Ax‖ / ‖b‖ to reach.
    pub tolerance: f64,
    /// Cycle budget of the outer conjugate gradient.
    pub max_iterations: usize,
}

impl Default for MultigridConfig {
    fn default() -> Self {
        Self {
            strength_threshold: 0.08,
            max_levels: 12,
            coarse_size: 64,
            pre_smooth: 1,
            post_smooth: 1,
            tolerance: 1e-10,
            max_iterations: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolverConfig {
    pub kind: LinearSolverKind,
    /// Node count up to which `Auto` picks the direct solver.
    pub direct_threshold: usize,
    pub multigrid: MultigridConfig,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::default(),
            direct_threshold: 20_000,
            multigrid: MultigridConfig::default(),
        }
    }
}

/// Initial vessel hematocrit of a flow solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HematocritSeed {
    /// Every vessel starts at the system discharge hematocrit.
    #[default]
    Uniform,
    /// Start from the hematocrit currently stored on the network.
    CarryOver,
}

/// Stopping rule of the inner hematocrit loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceCriterion {
    /// Max absolute hematocrit change below `hematocrit_tolerance`.
    #[default]
    HematocritChange,
    /// Berg residual below `berg_tolerance`: red-cell leakage at internal
    /// nodes over the boundary red-cell inflow, plus the relative changes of
    /// pressure, flow and hematocrit between iterations.
    Berg,
}

/// Flow solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub rheology: RheologyConfig,
    pub linear: LinearSolverConfig,
    pub seed: HematocritSeed,
    pub convergence: ConvergenceCriterion,
    /// ε_h: max absolute hematocrit change between inner iterations.
    pub hematocrit_tolerance: f64,
    pub max_inner_iterations: usize,
    /// Threshold of the Berg residual.
    pub berg_tolerance: f64,
    /// Allowed nodal mass imbalance relative to the total inflow.
    pub residual_tolerance: f64,
    /// Under-relaxation of the hematocrit update, in (0, 1].
    pub relaxation: f64,
    /// Sweep cap for hematocrit propagation on cyclic flow graphs.
    pub max_propagation_sweeps: usize,
    /// Flows below this fraction of the largest flow count as zero.
    pub zero_flow_tolerance: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            rheology: RheologyConfig::default(),
            linear: LinearSolverConfig::default(),
            seed: HematocritSeed::default(),
            convergence: ConvergenceCriterion::default(),
            hematocrit_tolerance: 1e-6,
            max_inner_iterations: 100,
            berg_tolerance: 1e-6,
            residual_tolerance: 1e-6,
            relaxation: 1.0,
            max_propagation_sweeps: 200,
            zero_flow_tolerance: 1e-12,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> SolverResult<()> {
        let invalid = |what: &str| {
            Err(SolverError::InvalidConfig {
                what: what.to_string(),
            })
        };
        if !(self.hematocrit_tolerance > 0.0) {
            return invalid("hematocrit_tolerance must be positive");
        }
        if !(self.berg_tolerance > 0.0) {
            return invalid("berg_tolerance must be positive");
        }
        if !(self.residual_tolerance > 0.0) {
            return invalid("residual_tolerance must be positive");
        }
        if self.max_inner_iterations == 0 {
            return invalid("max_inner_iterations must be positive");
        }
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return invalid("relaxation must lie in (0, 1]");
        }
        if !(self.zero_flow_tolerance >= 0.0) {
            return invalid("zero_flow_tolerance must be non-negative");
        }
        let rheo = &self.rheology;
        if !(rheo.plasma_viscosity > 0.0) {
            return invalid("plasma_viscosity must be positive");
        }
        if !(0.0..=1.0).contains(&rheo.discharge_hematocrit) {
            return invalid("discharge_hematocrit must lie in [0, 1]");
        }
        if !(rheo.max_hematocrit > 0.0 && rheo.max_hematocrit <= 1.0) {
            return invalid("max_hematocrit must lie in (0, 1]");
        }
        let mg = &self.linear.multigrid;
        if !(mg.tolerance > 0.0) || mg.max_iterations == 0 || mg.max_levels == 0 {
            return invalid("multigrid tolerance, max_iterations and max_levels must be positive");
        }
        Ok(())
    }
}
