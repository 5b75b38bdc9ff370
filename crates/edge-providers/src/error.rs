//! Error types for edge-providers

use thiserror::Error;

/// Errors returned by provider clients (object store, function platform, CDN).
///
/// The release engine surfaces these unchanged; nothing in this workspace
/// retries or masks them.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Object not present in the bucket
    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Function does not exist on the platform
    #[error("function not found: {name}")]
    FunctionNotFound { name: String },

    /// Distribution does not exist on the CDN
    #[error("distribution not found: {id}")]
    DistributionNotFound { id: String },

    /// Conditional write rejected because the distribution changed since it was read
    #[error("precondition failed: If-Match {expected} does not match current ETag {actual}")]
    PreconditionFailed { expected: String, actual: String },

    /// Bucket key or resource name cannot be mapped onto the backend
    #[error("invalid key: {key}")]
    InvalidKey { key: String },

    /// Continuation token was not issued by this provider
    #[error("invalid continuation token: {token}")]
    InvalidToken { token: String },

    /// Stored or supplied document is not usable
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// True when the error is an optimistic-concurrency rejection.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, ProviderError::PreconditionFailed { .. })
    }
}
