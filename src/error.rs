use thiserror::Error;

use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum CurriculaError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Decomposition failed: {0}")]
    DecompositionFailed(String),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
