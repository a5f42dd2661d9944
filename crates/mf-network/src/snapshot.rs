//! Serializable read-only view of a network's mutable state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: u32,
    pub name: String,
    /// Pa
    pub pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselSnapshot {
    pub id: u32,
    pub name: String,
    pub from: u32,
    pub to: u32,
    /// m
    pub diameter: f64,
    /// m³/s, signed by vessel direction
    pub flow: f64,
    pub hematocrit: f64,
    /// Pa·s
    pub viscosity: f64,
}

/// Pressures, flows, hematocrit and diameters at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub vessels: Vec<VesselSnapshot>,
}

impl NetworkSnapshot {
    /// Largest diameter in the snapshot, 0 for an empty one.
    pub fn max_diameter(&self) -> f64 {
        self.vessels.iter().map(|v| v.diameter).fold(0.0, f64::max)
    }

    /// Smallest diameter in the snapshot, infinity for an empty one.
    pub fn min_diameter(&self) -> f64 {
        self.vessels
            .iter()
            .map(|v| v.diameter)
            .fold(f64::INFINITY, f64::min)
    }
}
