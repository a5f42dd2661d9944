//! Fixed-step integrators for the diameter law.

use crate::error::AdaptResult;

/// A diameter vector evolving under dD/dt = f(D).
pub trait DiameterModel {
    /// dD/dt at diameters `d`.
    fn rates(&mut self, d: &[f64]) -> AdaptResult<Vec<f64>>;

    /// Nearest admissible diameters.
    fn project(&self, d: Vec<f64>) -> Vec<f64>;
}

/// Trait for diameter integrators.
pub trait Integrator {
    /// Advance diameters by one pseudo-time step. The result is not projected.
    fn step<M: DiameterModel>(&self, model: &mut M, d: &[f64], dt: f64) -> AdaptResult<Vec<f64>>;
}

/// Forward Euler (explicit, 1st order, one rate evaluation per step).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: DiameterModel>(&self, model: &mut M, d: &[f64], dt: f64) -> AdaptResult<Vec<f64>> {
        let k1 = model.rates(d)?;
        Ok(axpy(d, dt, &k1))
    }
}

/// Heun's method (explicit trapezoid, 2nd order, two rate evaluations per step).
#[derive(Clone, Debug)]
pub struct Heun;

impl Integrator for Heun {
    fn step<M: DiameterModel>(&self, model: &mut M, d: &[f64], dt: f64) -> AdaptResult<Vec<f64>> {
        let k1 = model.rates(d)?;
        let predictor = model.project(axpy(d, dt, &k1));
        let k2 = model.rates(&predictor)?;

        // Combine: d_new = d + (dt/2) * (k1 + k2)
        let k_sum: Vec<f64> = k1.iter().zip(&k2).map(|(a, b)| a + b).collect();
        Ok(axpy(d, 0.5 * dt, &k_sum))
    }
}

/// x + a·y
fn axpy(x: &[f64], a: f64, y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| xi + a * yi).collect()
}
