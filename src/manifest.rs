// Plugin manifest: a JSON list of plugin process descriptors. Loading is a
// pure data step; spawning the process and speaking its wire protocol is out
// of scope for the engine core.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginDescriptor {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<PluginDescriptor>, ManifestError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let descriptors: Vec<PluginDescriptor> = serde_json::from_str(&content)?;
    Ok(descriptors)
}
