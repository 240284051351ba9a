// Runtime configuration: finfocus.yml loading, mirroring the product-spec
// loader idiom (serde_yaml + thiserror, path-overridable).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engines::shared::models::ScopedBudgetSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_plugin_manifest_path")]
    pub plugin_manifest_path: String,
    #[serde(default)]
    pub scoped_budgets: ScopedBudgetSet,
    #[serde(default = "default_concurrency_limit")]
    pub overview_concurrency_limit: usize,
    #[serde(default = "default_timeout_ms")]
    pub per_resource_timeout_ms: u64,
    #[serde(default = "default_drift_threshold")]
    pub drift_warning_threshold_pct: f64,
}

fn default_plugin_manifest_path() -> String {
    "plugins.json".to_string()
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_drift_threshold() -> f64 {
    10.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugin_manifest_path: default_plugin_manifest_path(),
            scoped_budgets: ScopedBudgetSet::default(),
            overview_concurrency_limit: default_concurrency_limit(),
            per_resource_timeout_ms: default_timeout_ms(),
            drift_warning_threshold_pct: default_drift_threshold(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Loads `./finfocus.yml`. Absence is not an error here; callers that
/// genuinely need scoped budgets decide whether to require the file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path("finfocus.yml")
}

pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}
