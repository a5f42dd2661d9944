//! Schema migration framework.
//!
//! Version 1 is the first released schema, so no migration steps exist yet.
//! A later schema change adds a `vN => migrate_vN_to_vN1` arm here.

use crate::ProjectError;
use crate::schema::Project;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    Err(ProjectError::Migration {
        what: format!("No migration path from version {}", project.version),
    })
}
