//! Project validation logic.
//!
//! Catches file-level mistakes (duplicate ids, dangling references, values
//! out of range) with the ids the user wrote. Graph-level checks such as
//! connectivity and boundary determinacy run when the network is built.

use crate::schema::{BoundaryDef, NodeDef, Project, VesselDef};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    let mut node_ids = HashSet::new();
    for node in &project.network.nodes {
        if !node_ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: node.id.clone(),
                context: "network nodes".to_string(),
            });
        }
        validate_node(node)?;
    }

    let mut vessel_ids = HashSet::new();
    for vessel in &project.network.vessels {
        if !vessel_ids.insert(vessel.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: vessel.id.clone(),
                context: "network vessels".to_string(),
            });
        }
        validate_vessel(vessel, &node_ids)?;
    }

    project
        .flow
        .validate()
        .map_err(|e| ValidationError::Config(e.to_string()))?;
    project
        .adaptation
        .validate()
        .map_err(|e| ValidationError::Config(e.to_string()))?;

    Ok(())
}

fn validate_node(node: &NodeDef) -> Result<(), ValidationError> {
    if let Some(position) = node.position_um {
        if position.iter().any(|x| !x.is_finite()) {
            return Err(invalid(
                format!("node '{}' position_um", node.id),
                format!("{:?}", position),
                "must be finite",
            ));
        }
    }

    match node.boundary {
        Some(BoundaryDef::Pressure { pressure_mmhg }) if !pressure_mmhg.is_finite() => {
            return Err(invalid(
                format!("node '{}' pressure_mmhg", node.id),
                pressure_mmhg.to_string(),
                "must be finite",
            ));
        }
        Some(BoundaryDef::Flow { flow_nl_per_min }) if !flow_nl_per_min.is_finite() => {
            return Err(invalid(
                format!("node '{}' flow_nl_per_min", node.id),
                flow_nl_per_min.to_string(),
                "must be finite",
            ));
        }
        _ => {}
    }

    if let Some(h) = node.inflow_hematocrit {
        if !(0.0..1.0).contains(&h) {
            return Err(invalid(
                format!("node '{}' inflow_hematocrit", node.id),
                h.to_string(),
                "must be in [0, 1)",
            ));
        }
        if node.boundary.is_none() {
            return Err(invalid(
                format!("node '{}' inflow_hematocrit", node.id),
                h.to_string(),
                "only boundary nodes take an inflow hematocrit",
            ));
        }
    }

    Ok(())
}

fn validate_vessel(vessel: &VesselDef, node_ids: &HashSet<&str>) -> Result<(), ValidationError> {
    for node_id in [&vessel.from_node_id, &vessel.to_node_id] {
        if !node_ids.contains(node_id.as_str()) {
            return Err(ValidationError::MissingReference {
                id: node_id.clone(),
                context: format!("vessel '{}'", vessel.id),
            });
        }
    }

    if vessel.from_node_id == vessel.to_node_id {
        return Err(invalid(
            format!("vessel '{}' to_node_id", vessel.id),
            vessel.to_node_id.clone(),
            "vessel must connect two different nodes",
        ));
    }

    for (field, value) in [
        ("length_um", vessel.length_um),
        ("diameter_um", vessel.diameter_um),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(invalid(
                format!("vessel '{}' {}", vessel.id, field),
                value.to_string(),
                "must be positive",
            ));
        }
    }

    Ok(())
}

fn invalid(field: String, value: String, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value,
        reason: reason.to_string(),
    }
}
