//! Engine configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Tunables of the metadata service, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on identifiers invalidated by one propagation pass
    pub max_pass_len: usize,

    /// Fail on self or same-class edges; when false they are logged and skipped
    pub reject_invalid_edges: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pass_len: 10_000,
            reject_invalid_edges: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Read a JSON config file; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_json(&source)
    }
}
