//! Project schema definitions.
//!
//! Geometry is written in µm, pressures in mmHg and flows in nl/min, the
//! units network data is usually published in. Compilation converts to SI.

use mf_adapt::AdaptationConfig;
use mf_solver::FlowConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub network: NetworkDef,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub adaptation: AdaptationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkDef {
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub vessels: Vec<VesselDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub id: String,
    /// Display name; the id is used when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// µm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_um: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<BoundaryDef>,
    /// Discharge hematocrit of blood entering here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflow_hematocrit: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryDef {
    Pressure {
        pressure_mmhg: f64,
    },
    /// Positive into the network.
    Flow {
        flow_nl_per_min: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VesselDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub length_um: f64,
    pub diameter_um: f64,
}

impl NodeDef {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

impl VesselDef {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}
