//! Application configuration file loading.
//!
//! Reads a configuration tree from YAML (`.yaml`/`.yml`) or JSON (`.json`)
//! and optionally compiles it into an `ActionGraph`.

use std::path::Path;

use thiserror::Error;

use waypoint_types::application::ApplicationConfiguration;

use crate::graph::{ActionGraph, GraphBuilder, GraphError};

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// YAML/JSON parse failure.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// The file extension is not one we know how to read.
    #[error("unsupported configuration format '{0}' (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tree parsed but does not compile.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// On-disk encoding of a configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, DefinitionError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            other => Err(DefinitionError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Parse a configuration tree from a string.
pub fn parse_configuration(
    content: &str,
    format: Format,
    origin: &str,
) -> Result<ApplicationConfiguration, DefinitionError> {
    let parsed = match format {
        Format::Yaml => serde_yaml_ng::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| DefinitionError::Parse {
        path: origin.to_string(),
        message,
    })
}

/// Read and parse a configuration file.
pub fn load_configuration(path: &Path) -> Result<ApplicationConfiguration, DefinitionError> {
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_configuration(&content, format, &path.display().to_string())
}

/// Read, parse and compile a configuration file.
pub fn load_graph(path: &Path) -> Result<ActionGraph, DefinitionError> {
    let conf = load_configuration(path)?;
    let graph = GraphBuilder::compile(&conf)?;
    tracing::debug!(path = %path.display(), nodes = graph.len(), "loaded application configuration");
    Ok(graph)
}
