//! Provider trait definitions for edge-release
//!
//! These traits define the external collaborators the release engine drives:
//! - `ObjectStore`: code artifact storage (put/get by bucket + key)
//! - `FunctionPlatform`: code pointer updates, version publishing, version listing
//! - `CdnDistributions`: distribution config fetch and conditional update
//! - `ProviderFactory`: constructs region-scoped clients for the three above
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; `fs_backend` provides a local sandbox.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::ProviderError;

/// Result type for provider operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Streaming request body for object uploads.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Wrap an in-memory buffer as a [`ByteStream`].
pub fn byte_stream(data: Vec<u8>) -> ByteStream {
    Box::pin(std::io::Cursor::new(data))
}

// ---------------------------------------------------------------------------
// ObjectStore: code artifact storage
// ---------------------------------------------------------------------------

/// Bucket/key addressed object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the full contents of `body` to `bucket/key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: ByteStream) -> ProviderResult<()>;

    /// Read an object. Returns `ProviderError::NotFound` if absent.
    async fn get_object(&self, bucket: &str, key: &str) -> ProviderResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// FunctionPlatform: code pointer, versions
// ---------------------------------------------------------------------------

/// Label of the mutable pseudo-version that always tracks the current code.
pub const LATEST_VERSION: &str = "$LATEST";

/// One entry of a function's version list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionVersion {
    /// Version label: a decimal integer, or `$LATEST`
    pub version: String,
    /// Qualified ARN of this version
    pub function_arn: String,
}

impl FunctionVersion {
    pub fn new(version: impl Into<String>, function_arn: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            function_arn: function_arn.into(),
        }
    }

    /// True for the `$LATEST` pseudo-version.
    pub fn is_latest_alias(&self) -> bool {
        self.version == LATEST_VERSION
    }
}

/// One page of a version listing.
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    pub versions: Vec<FunctionVersion>,
    /// Continuation token; `None` on the last page
    pub next_marker: Option<String>,
}

/// Where new function code comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// Reference an object the platform reads itself (same region only)
    S3 { bucket: String, key: String },
    /// Inline archive bytes
    ZipFile(Vec<u8>),
}

impl fmt::Debug for CodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeSource::S3 { bucket, key } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("key", key)
                .finish(),
            CodeSource::ZipFile(bytes) => write!(f, "ZipFile({} bytes)", bytes.len()),
        }
    }
}

/// Serverless function platform.
///
/// Semantics:
/// - `list_versions` pages through every version including `$LATEST`; order
///   within and across pages is unspecified.
/// - `update_function_code` replaces the code behind `$LATEST`.
/// - `publish_version` snapshots `$LATEST` as a new immutable numbered version.
#[async_trait]
pub trait FunctionPlatform: Send + Sync {
    /// Fetch one page of versions, starting at `marker` (first page when `None`).
    async fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> ProviderResult<VersionPage>;

    /// Point the function's `$LATEST` code at `code`.
    async fn update_function_code(&self, function_name: &str, code: CodeSource)
        -> ProviderResult<()>;

    /// Publish a new immutable version and return it.
    async fn publish_version(&self, function_name: &str) -> ProviderResult<FunctionVersion>;
}

// ---------------------------------------------------------------------------
// CdnDistributions: edge trigger bindings
// ---------------------------------------------------------------------------

/// A distribution config together with the ETag it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionConfig {
    /// Opacity token; must be echoed back unchanged on update
    pub etag: String,
    /// Provider-owned document; only partially understood by the engine
    pub config: serde_json::Value,
}

/// CDN distribution configuration access.
///
/// Guarantees:
/// - `update_distribution_config` succeeds only when `if_match` equals the
///   current ETag; otherwise it fails with `ProviderError::PreconditionFailed`.
/// - A successful update yields a new ETag.
#[async_trait]
pub trait CdnDistributions: Send + Sync {
    /// Read the current config and its ETag.
    async fn get_distribution_config(&self, distribution_id: &str)
        -> ProviderResult<DistributionConfig>;

    /// Replace the config if nobody changed it since `if_match` was read. Returns the new ETag.
    async fn update_distribution_config(
        &self,
        distribution_id: &str,
        if_match: &str,
        config: serde_json::Value,
    ) -> ProviderResult<String>;
}

// ---------------------------------------------------------------------------
// ProviderFactory: construct-with-region
// ---------------------------------------------------------------------------

/// Builds region-scoped provider clients. `None` selects the provider default region.
pub trait ProviderFactory: Send + Sync {
    fn object_store(&self, region: Option<&str>) -> ProviderResult<Arc<dyn ObjectStore>>;

    fn function_platform(&self, region: Option<&str>) -> ProviderResult<Arc<dyn FunctionPlatform>>;

    fn cdn(&self, region: Option<&str>) -> ProviderResult<Arc<dyn CdnDistributions>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_alias_detected() {
        assert!(FunctionVersion::new("$LATEST", "arn:fn:$LATEST").is_latest_alias());
        assert!(!FunctionVersion::new("3", "arn:fn:3").is_latest_alias());
    }

    #[test]
    fn zip_source_debug_hides_bytes() {
        let source = CodeSource::ZipFile(vec![0u8; 2048]);
        assert_eq!(format!("{:?}", source), "ZipFile(2048 bytes)");
    }

    #[tokio::test]
    async fn byte_stream_yields_buffer() {
        use tokio::io::AsyncReadExt;

        let mut stream = byte_stream(b"zip bytes".to_vec());
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"zip bytes");
    }
}
