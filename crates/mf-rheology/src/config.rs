//! Rheology configuration and law selection.

use serde::{Deserialize, Serialize};

/// Apparent viscosity law.
///
/// Empirical fits take the diameter in micrometres, following the papers
/// they come from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViscosityLaw {
    /// Constant viscosity, `relative` times the plasma viscosity.
    Newtonian { relative: f64 },
    /// In-vitro tube flow fit (Pries, Neuhaus, Gaehtgens 1992).
    VitroPries1992,
    /// In-vivo fit (Pries et al. 1994), including the endothelial layer factor.
    #[default]
    VivoPries1994,
}

/// Red-cell distribution law at a diverging bifurcation.
///
/// The Pries family share one logit form and differ only in coefficients;
/// `Custom` allows a new fit without touching the flow solver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhaseSeparationLaw {
    /// Red cells follow the blood: daughter hematocrit equals parent hematocrit.
    Proportional,
    /// Pries et al. 1990 coefficients.
    Pries1990,
    /// Pries and Secomb 2005 coefficients.
    #[default]
    PriesSecomb2005,
    /// Logit law with user supplied coefficients (µm).
    Custom { x0: f64, a: f64, b: f64 },
}

impl PhaseSeparationLaw {
    /// Coefficients (x0, a, b) of the logit form, `None` for the proportional law.
    pub fn coefficients(&self) -> Option<(f64, f64, f64)> {
        match *self {
            PhaseSeparationLaw::Proportional => None,
            PhaseSeparationLaw::Pries1990 => Some((0.964, 13.29, 6.98)),
            PhaseSeparationLaw::PriesSecomb2005 => Some((1.12, 15.47, 8.13)),
            PhaseSeparationLaw::Custom { x0, a, b } => Some((x0, a, b)),
        }
    }
}

/// Rheology parameters threaded through every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RheologyConfig {
    pub viscosity_law: ViscosityLaw,
    pub phase_separation: PhaseSeparationLaw,
    /// Plasma viscosity (Pa·s).
    pub plasma_viscosity: f64,
    /// Discharge hematocrit of blood entering at boundaries without their own value.
    pub discharge_hematocrit: f64,
    /// Ceiling on daughter hematocrit; the surplus goes to the sibling branch.
    pub max_hematocrit: f64,
}

impl Default for RheologyConfig {
    fn default() -> Self {
        Self {
            viscosity_law: ViscosityLaw::default(),
            phase_separation: PhaseSeparationLaw::default(),
            plasma_viscosity: 1.2e-3,
            discharge_hematocrit: 0.45,
            max_hematocrit: 0.99,
        }
    }
}

impl RheologyConfig {
    /// Newtonian blood with the given absolute viscosity and no phase separation.
    pub fn newtonian(viscosity: f64) -> Self {
        Self {
            viscosity_law: ViscosityLaw::Newtonian { relative: 1.0 },
            phase_separation: PhaseSeparationLaw::Proportional,
            plasma_viscosity: viscosity,
            ..Self::default()
        }
    }
}
