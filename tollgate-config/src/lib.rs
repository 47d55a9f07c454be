//! JSON loader for tollgate limit definitions.
//!
//! The wire format is a list of objects with `id`, `intervalSeconds`, and
//! `tokensPerInterval` fields:
//!
//! ```json
//! [
//!   {"id": "ID1", "intervalSeconds": 5, "tokensPerInterval": 10},
//!   {"id": "ID2", "intervalSeconds": 10, "tokensPerInterval": 100}
//! ]
//! ```
//!
//! The loader only decodes; semantic validation (positive intervals,
//! duplicate resolution) happens in `Throttler::load_config`.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tollgate::LimitDefinition;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// The file or stream could not be read.
    Read(String),
    /// The content was not a valid JSON list of limit definitions.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "config read error: {msg}"),
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Decode limit definitions from a JSON string.
pub fn from_json_str(content: &str) -> Result<Vec<LimitDefinition>, ConfigError> {
    let definitions: Vec<LimitDefinition> =
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    warn_on_duplicates(&definitions);
    Ok(definitions)
}

/// Decode limit definitions from a reader.
pub fn from_reader(reader: impl Read) -> Result<Vec<LimitDefinition>, ConfigError> {
    let definitions: Vec<LimitDefinition> =
        serde_json::from_reader(reader).map_err(|e| ConfigError::Parse(e.to_string()))?;
    warn_on_duplicates(&definitions);
    Ok(definitions)
}

/// Read and decode limit definitions from a file path.
pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<LimitDefinition>, ConfigError> {
    let content =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read(e.to_string()))?;
    from_json_str(&content)
}

fn warn_on_duplicates(definitions: &[LimitDefinition]) {
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(def.id.as_str()) {
            tracing::warn!(id = %def.id, "duplicate limit definition, the last one wins");
        }
    }
}
