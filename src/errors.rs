// Top-level error surface: the engine error model plus CLI-facing wrapping.

use thiserror::Error;

pub use crate::engines::shared::error_model::{EngineError, ErrorType, Result};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Manifest(#[from] crate::manifest::ManifestError),
    #[error(transparent)]
    KvStore(#[from] crate::kvstore::KvStoreError),
    #[error(transparent)]
    Dismissal(#[from] crate::dismissal::DismissalError),
    #[error(transparent)]
    Render(#[from] crate::render::RenderError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
