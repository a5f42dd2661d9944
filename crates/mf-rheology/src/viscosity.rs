//! Apparent viscosity laws.

use mf_core::units::constants::UM_PER_M;

use crate::config::{RheologyConfig, ViscosityLaw};
use crate::error::{RheologyError, RheologyResult, positive};

/// Reference hematocrit of the Pries fits.
const H_REF: f64 = 0.45;

/// Below this diameter (µm) the in-vivo wall layer term diverges.
const VIVO_MIN_DIAMETER_UM: f64 = 2.0;

/// Hematocrit cap inside the shape function when it diverges at H = 1.
const SHAPE_MAX_HEMATOCRIT: f64 = 0.99;

/// A law mapping (diameter, hematocrit) to viscosity relative to plasma.
pub trait ViscosityModel {
    /// Relative apparent viscosity for a diameter in µm and hematocrit in [0, 1].
    fn relative_viscosity(&self, diameter_um: f64, hematocrit: f64) -> f64;
}

impl ViscosityModel for ViscosityLaw {
    fn relative_viscosity(&self, diameter_um: f64, hematocrit: f64) -> f64 {
        match *self {
            ViscosityLaw::Newtonian { relative } => relative,
            ViscosityLaw::VitroPries1992 => {
                let eta45 = 220.0 * (-1.3 * diameter_um).exp() + 3.2
                    - 2.44 * (-0.06 * diameter_um.powf(0.645)).exp();
                1.0 + (eta45 - 1.0) * shape(diameter_um, hematocrit)
            }
            ViscosityLaw::VivoPries1994 => {
                let d = if diameter_um < VIVO_MIN_DIAMETER_UM {
                    tracing::warn!(
                        diameter_um,
                        floor = VIVO_MIN_DIAMETER_UM,
                        "in-vivo viscosity law evaluated at diameter floor"
                    );
                    VIVO_MIN_DIAMETER_UM
                } else {
                    diameter_um
                };
                let eta45 = 6.0 * (-0.085 * d).exp() + 3.2 - 2.44 * (-0.06 * d.powf(0.645)).exp();
                let wall = (d / (d - 1.1)).powi(2);
                (1.0 + (eta45 - 1.0) * shape(d, hematocrit) * wall) * wall
            }
        }
    }
}

/// Hematocrit dependence normalised to 1 at H = 0.45.
///
/// `((1-H)^C - 1) / ((1-0.45)^C - 1)`, with the logarithmic limit near C = 0.
fn shape(diameter_um: f64, hematocrit: f64) -> f64 {
    let s = 1.0 / (1.0 + 1e-11 * diameter_um.powi(12));
    let c = (0.8 + (-0.075 * diameter_um).exp()) * (s - 1.0) + s;

    if c.abs() < 1e-9 {
        let h = hematocrit.min(SHAPE_MAX_HEMATOCRIT);
        return (1.0 - h).ln() / (1.0 - H_REF).ln();
    }
    let h = if c < 0.0 {
        hematocrit.min(SHAPE_MAX_HEMATOCRIT)
    } else {
        hematocrit
    };
    ((1.0 - h).powf(c) - 1.0) / ((1.0 - H_REF).powf(c) - 1.0)
}

/// Apparent viscosity (Pa·s) of blood in a vessel of `diameter` (m).
///
/// Hematocrit outside [0, 1] is clamped and logged, not rejected.
pub fn apparent_viscosity(
    cfg: &RheologyConfig,
    diameter: f64,
    hematocrit: f64,
) -> RheologyResult<f64> {
    let diameter = positive(diameter, "diameter")?;
    if hematocrit.is_nan() {
        return Err(RheologyError::NonFinite {
            what: "hematocrit",
            value: hematocrit,
        });
    }
    let h = if (0.0..=1.0).contains(&hematocrit) {
        hematocrit
    } else {
        let clamped = hematocrit.clamp(0.0, 1.0);
        tracing::warn!(hematocrit, clamped, "hematocrit clamped to [0, 1]");
        clamped
    };

    let relative = cfg
        .viscosity_law
        .relative_viscosity(diameter * UM_PER_M, h);
    let mu = cfg.plasma_viscosity * relative;
    positive(mu, "apparent viscosity")
}
