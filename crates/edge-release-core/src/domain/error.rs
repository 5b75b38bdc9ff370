//! Domain-level error taxonomy for edge releases.

use std::path::PathBuf;

use edge_providers::ProviderError;

/// Errors produced by release request validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("release request must be a JSON object")]
    NotAnObject,

    #[error("unknown field: {field}")]
    UnknownField { field: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("cfTriggers must be a non-empty array")]
    NoTriggers,

    #[error("cfTriggers[{index}] must be an object")]
    TriggerNotAnObject { index: usize },

    #[error("cfTriggers[{index}] has unknown field: {field}")]
    UnknownTriggerField { index: usize, field: String },

    #[error("cfTriggers[{index}] missing required field: {field}")]
    MissingTriggerField { index: usize, field: String },

    #[error("unknown trigger slot: {name}")]
    UnknownTriggerSlot { name: String },

    #[error("malformed release request: {0}")]
    Malformed(String),
}

/// Release errors.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("config invalid: {0}")]
    ConfigInvalid(#[from] ValidationError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("cannot read artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot load config file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// The provider error underneath, when the failure came from a provider call.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for release operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;
