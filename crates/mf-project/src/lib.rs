//! mf-project: network description files and run configuration.
//!
//! A project file holds a network (nodes, vessels, boundary conditions) plus
//! the flow and adaptation settings to run on it. YAML and JSON are both
//! accepted; [`load`] picks the format from the file extension.

pub mod compile;
pub mod migrate;
pub mod schema;
pub mod validate;

use std::path::Path;

pub use compile::{CompiledNetwork, compile_network};
pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use validate::{ValidationError, validate_project};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("Compile error: {what}")]
    Compile { what: String },

    #[error("Network error: {0}")]
    Network(#[from] mf_network::NetworkError),

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File formats a project can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> ProjectResult<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            _ => Err(ProjectError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// Parse, migrate and validate a project from text.
pub fn parse(content: &str, format: Format) -> ProjectResult<Project> {
    let project: Project = match format {
        Format::Yaml => serde_yaml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };
    let project = migrate_to_latest(project)?;
    validate_project(&project)?;
    Ok(project)
}

/// Load a project, choosing YAML or JSON by extension.
pub fn load(path: &Path) -> ProjectResult<Project> {
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let project = parse(&content, format)?;
    tracing::info!(
        path = %path.display(),
        nodes = project.network.nodes.len(),
        vessels = project.network.vessels.len(),
        "project loaded"
    );
    Ok(project)
}

/// Save a project, choosing YAML or JSON by extension.
pub fn save(path: &Path, project: &Project) -> ProjectResult<()> {
    match Format::from_path(path)? {
        Format::Yaml => save_yaml(path, project),
        Format::Json => save_json(path, project),
    }
}

pub fn load_yaml(path: &Path) -> ProjectResult<Project> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, Format::Yaml)
}

pub fn save_yaml(path: &Path, project: &Project) -> ProjectResult<()> {
    validate_project(project)?;
    let content = serde_yaml::to_string(project)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<Project> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, Format::Json)
}

pub fn save_json(path: &Path, project: &Project) -> ProjectResult<()> {
    validate_project(project)?;
    let content = serde_json::to_string_pretty(project)?;
    std::fs::write(path, content)?;
    Ok(())
}

impl Project {
    /// Build the project's network.
    pub fn compile(&self) -> ProjectResult<CompiledNetwork> {
        compile_network(&self.network)
    }
}
