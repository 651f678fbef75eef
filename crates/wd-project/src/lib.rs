//! wd-project: persisted network description format and validation.
//!
//! The description is what an engine is opened from and what it exports
//! back; values are in the engine-native units selected by
//! `options.flow_units`.

pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::{ValidationError, validate_network};

use std::path::Path;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported file extension: {path}")]
    UnknownFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &Path) -> ProjectResult<NetworkDef> {
    let content = std::fs::read_to_string(path)?;
    let network: NetworkDef = serde_yaml::from_str(&content)?;
    validate_network(&network)?;
    Ok(network)
}

pub fn save_yaml(path: &Path, network: &NetworkDef) -> ProjectResult<()> {
    validate_network(network)?;
    let content = serde_yaml::to_string(network)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<NetworkDef> {
    let content = std::fs::read_to_string(path)?;
    let network: NetworkDef = serde_json::from_str(&content)?;
    validate_network(&network)?;
    Ok(network)
}

pub fn save_json(path: &Path, network: &NetworkDef) -> ProjectResult<()> {
    validate_network(network)?;
    let content = serde_json::to_string_pretty(network)?;
    std::fs::write(path, content)?;
    Ok(())
}

enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> ProjectResult<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => Err(ProjectError::UnknownFormat {
            path: path.display().to_string(),
        }),
    }
}

/// Load by file extension (`.yaml`/`.yml` or `.json`).
pub fn load(path: &Path) -> ProjectResult<NetworkDef> {
    match format_of(path)? {
        Format::Yaml => load_yaml(path),
        Format::Json => load_json(path),
    }
}

/// Save by file extension, in the same format [`load`] reads.
pub fn save(path: &Path, network: &NetworkDef) -> ProjectResult<()> {
    match format_of(path)? {
        Format::Yaml => save_yaml(path, network),
        Format::Json => save_json(path, network),
    }
}
