//! Poiseuille resistance and wall shear stress.

use std::f64::consts::PI;

use crate::error::{RheologyResult, positive};

/// Hydraulic resistance (Pa·s/m³) of a cylindrical vessel.
///
/// r = 128 μ L / (π D⁴)
pub fn resistance(diameter: f64, length: f64, viscosity: f64) -> RheologyResult<f64> {
    let d = positive(diameter, "diameter")?;
    let l = positive(length, "length")?;
    let mu = positive(viscosity, "viscosity")?;
    Ok(128.0 * mu * l / (PI * d.powi(4)))
}

/// Wall shear stress magnitude (Pa) for flow `flow` (m³/s).
///
/// τ = 32 μ |Q| / (π D³)
pub fn wall_shear_stress(diameter: f64, viscosity: f64, flow: f64) -> RheologyResult<f64> {
    let d = positive(diameter, "diameter")?;
    let mu = positive(viscosity, "viscosity")?;
    Ok(32.0 * mu * flow.abs() / (PI * d.powi(3)))
}
