//! sf-project: declarative document formats and validation.
//!
//! Two document kinds exist: the system document (the model definition,
//! loaded once per run) and the override document (step-indexed value
//! injections for data-driven runs). Field names follow the documents'
//! attribute spelling (`timeSteps`, `max_level`, `stepValue`, ...).

pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::{ValidationError, validate_system};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_system_yaml(path: &std::path::Path) -> ProjectResult<SystemDoc> {
    let content = std::fs::read_to_string(path)?;
    let doc: SystemDoc = serde_yaml::from_str(&content)?;
    validate_system(&doc)?;
    Ok(doc)
}

pub fn load_system_json(path: &std::path::Path) -> ProjectResult<SystemDoc> {
    let content = std::fs::read_to_string(path)?;
    let doc: SystemDoc = serde_json::from_str(&content)?;
    validate_system(&doc)?;
    Ok(doc)
}

pub fn save_system_yaml(path: &std::path::Path, doc: &SystemDoc) -> ProjectResult<()> {
    validate_system(doc)?;
    let content = serde_yaml::to_string(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_overrides_yaml(path: &std::path::Path) -> ProjectResult<OverrideDoc> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

pub fn load_overrides_json(path: &std::path::Path) -> ProjectResult<OverrideDoc> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
