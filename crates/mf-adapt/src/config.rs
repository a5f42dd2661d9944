//! Adaptation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{AdaptError, AdaptResult};

/// Weights and reference values of the stimulus law.
///
/// Defaults are the Pries, Secomb and Gaehtgens (1998) fit; reference values
/// are in the units that fit was made in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusWeights {
    /// Wall shear stress sensitivity.
    pub k_wss: f64,
    /// Shear stress offset (dyn/cm²).
    pub tau_ref: f64,
    /// Transmural pressure sensitivity.
    pub k_p: f64,
    /// Metabolic sensitivity.
    pub k_m: f64,
    /// Reference red-cell flux (nl/min).
    pub q_ref: f64,
    /// Conducted response sensitivity.
    pub k_c: f64,
    /// Conducted response saturation constant.
    pub j0: f64,
    /// Conducted signal decay length (m).
    pub l_ref: f64,
    /// Shrinking tendency.
    pub k_s: f64,
    /// Transmural pressure floor (mmHg).
    pub min_pressure: f64,
    /// Tissue pressure outside the vessel wall (mmHg).
    pub external_pressure: f64,
}

impl Default for StimulusWeights {
    fn default() -> Self {
        Self {
            k_wss: 1.0,
            tau_ref: 0.103,
            k_p: 0.68,
            k_m: 0.70,
            q_ref: 0.198,
            k_c: 2.45,
            j0: 27.9,
            l_ref: 1.9e-2,
            k_s: 1.72,
            min_pressure: 10.0,
            external_pressure: 0.0,
        }
    }
}

impl StimulusWeights {
    /// Every term switched off; the stimulus is identically zero.
    pub fn zero() -> Self {
        Self {
            k_wss: 0.0,
            k_p: 0.0,
            k_m: 0.0,
            k_c: 0.0,
            k_s: 0.0,
            ..Self::default()
        }
    }
}

/// Time integrator for the diameter law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// One flow solve per step.
    #[default]
    ForwardEuler,
    /// Explicit trapezoid, two flow solves per step.
    Heun,
}

/// Options of an adaptation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub weights: StimulusWeights,
    pub integrator: IntegratorType,
    /// Pseudo-time step Δt.
    pub time_step: f64,
    pub max_steps: usize,
    /// ε_d: max relative diameter change that counts as steady state.
    pub diameter_tolerance: f64,
    /// Absolute diameter bounds (m).
    pub min_diameter: f64,
    pub max_diameter: f64,
    /// Optional bound relative to each vessel's nominal diameter:
    /// [nominal / f, nominal · f].
    pub nominal_factor: Option<f64>,
    /// Seed each flow solve with the previous step's hematocrit.
    pub carry_over_hematocrit: bool,
    /// Keep a network snapshot every N steps (0 disables the history).
    pub record_every: usize,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            weights: StimulusWeights::default(),
            integrator: IntegratorType::default(),
            time_step: 0.1,
            max_steps: 500,
            diameter_tolerance: 1e-4,
            min_diameter: 2e-6,
            max_diameter: 200e-6,
            nominal_factor: None,
            carry_over_hematocrit: true,
            record_every: 0,
        }
    }
}

impl AdaptationConfig {
    pub fn validate(&self) -> AdaptResult<()> {
        let invalid = |what| Err(AdaptError::InvalidArg { what });
        if !(self.time_step > 0.0) {
            return invalid("time_step must be positive");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be positive");
        }
        if !(self.diameter_tolerance > 0.0) {
            return invalid("diameter_tolerance must be positive");
        }
        if !(self.min_diameter >= 0.0) || !(self.max_diameter > self.min_diameter) {
            return invalid("diameter bounds must satisfy 0 <= min_diameter < max_diameter");
        }
        if self.nominal_factor.is_some_and(|f| !(f >= 1.0)) {
            return invalid("nominal_factor must be at least 1");
        }
        let w = &self.weights;
        if !(w.tau_ref > 0.0 && w.q_ref > 0.0 && w.j0 > 0.0 && w.l_ref > 0.0) {
            return invalid("stimulus reference values must be positive");
        }
        // The pressure set point is defined from 10 mmHg up
        if !(w.min_pressure >= 10.0) {
            return invalid("min_pressure must be at least 10 mmHg");
        }
        Ok(())
    }

    /// Bounds of one vessel given its nominal diameter.
    pub fn bounds(&self, nominal: f64) -> (f64, f64) {
        match self.nominal_factor {
            Some(f) => (
                self.min_diameter.max(nominal / f),
                self.max_diameter.min(nominal * f),
            ),
            None => (self.min_diameter, self.max_diameter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AdaptationConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let cfg = AdaptationConfig {
            min_diameter: 10e-6,
            max_diameter: 5e-6,
            ..AdaptationConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(AdaptError::InvalidArg { .. })
        ));
    }

    #[test]
    fn pressure_floor_below_the_set_point_range_is_rejected() {
        for min_pressure in [5.0, 9.99, f64::NAN] {
            let cfg = AdaptationConfig {
                weights: StimulusWeights {
                    min_pressure,
                    ..StimulusWeights::default()
                },
                ..AdaptationConfig::default()
            };
            assert!(
                matches!(cfg.validate(), Err(AdaptError::InvalidArg { .. })),
                "{min_pressure}"
            );
        }
        let at_edge = AdaptationConfig {
            weights: StimulusWeights {
                min_pressure: 10.0,
                ..StimulusWeights::default()
            },
            ..AdaptationConfig::default()
        };
        at_edge.validate().unwrap();
    }

    #[test]
    fn nominal_factor_tightens_bounds() {
        let cfg = AdaptationConfig {
            nominal_factor: Some(2.0),
            ..AdaptationConfig::default()
        };
        let (lo, hi) = cfg.bounds(10e-6);
        assert!((lo - 5e-6).abs() < 1e-18);
        assert!((hi - 20e-6).abs() < 1e-18);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: AdaptationConfig =
            serde_json::from_str(r#"{"time_step": 0.5, "integrator": "heun"}"#).unwrap();
        assert_eq!(cfg.integrator, IntegratorType::Heun);
        assert_eq!(cfg.time_step, 0.5);
        assert_eq!(cfg.max_steps, 500);
    }
}
