//! In-memory fakes for provider traits (testing only)
//!
//! Provides `MemoryObjectStore`, `MemoryFunctionPlatform`, `MemoryCdn` and the
//! `MemoryProviders` factory. Every mutating call is recorded so tests can
//! assert exactly what the engine asked the providers to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::error::ProviderError;
use crate::provider_traits::*;

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// A recorded `put_object` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
}

/// In-memory object store backed by a `HashMap<(bucket, key), bytes>`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    puts: Mutex<Vec<PutRecord>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording a put.
    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert((bucket.to_string(), key.to_string()), data.to_vec());
    }

    /// Every `put_object` call, in call order.
    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, mut body: ByteStream) -> ProviderResult<()> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;

        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data.clone());
        self.puts.lock().unwrap().push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body: data,
        });
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ProviderResult<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryFunctionPlatform
// ---------------------------------------------------------------------------

/// A recorded function platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ListVersions {
        function_name: String,
        marker: Option<String>,
    },
    UpdateCode {
        function_name: String,
        code: CodeSource,
    },
    Publish {
        function_name: String,
    },
}

impl PlatformCall {
    fn is_mutating(&self) -> bool {
        !matches!(self, PlatformCall::ListVersions { .. })
    }
}

#[derive(Debug, Default)]
struct FunctionState {
    versions: Vec<FunctionVersion>,
    code: Option<CodeSource>,
}

/// In-memory function platform.
///
/// Versions are listed in insertion order, `page_size` entries per page, so
/// tests control both ordering and pagination.
#[derive(Debug)]
pub struct MemoryFunctionPlatform {
    functions: Mutex<HashMap<String, FunctionState>>,
    calls: Mutex<Vec<PlatformCall>>,
    page_size: usize,
}

impl Default for MemoryFunctionPlatform {
    fn default() -> Self {
        Self {
            functions: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            page_size: 50,
        }
    }
}

impl MemoryFunctionPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many versions each `list_versions` page carries (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Create a function whose version list is exactly `versions`, in this order.
    pub fn insert_function(&self, function_name: &str, versions: Vec<FunctionVersion>) {
        let mut functions = self.functions.lock().unwrap();
        functions.insert(
            function_name.to_string(),
            FunctionState {
                versions,
                code: None,
            },
        );
    }

    /// Current code pointer of a function, if any was set.
    pub fn code(&self, function_name: &str) -> Option<CodeSource> {
        let functions = self.functions.lock().unwrap();
        functions.get(function_name).and_then(|f| f.code.clone())
    }

    /// Every call, in call order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that changed platform state (code updates and publishes).
    pub fn mutating_calls(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(PlatformCall::is_mutating)
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl FunctionPlatform for MemoryFunctionPlatform {
    async fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> ProviderResult<VersionPage> {
        self.record(PlatformCall::ListVersions {
            function_name: function_name.to_string(),
            marker: marker.map(str::to_string),
        });

        let functions = self.functions.lock().unwrap();
        let state = functions
            .get(function_name)
            .ok_or_else(|| ProviderError::FunctionNotFound {
                name: function_name.to_string(),
            })?;

        let start = match marker {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ProviderError::InvalidToken {
                    token: token.to_string(),
                })?,
            None => 0,
        };
        let end = (start + self.page_size).min(state.versions.len());
        let versions = state.versions.get(start..end).unwrap_or_default().to_vec();
        let next_marker = (end < state.versions.len()).then(|| end.to_string());

        Ok(VersionPage {
            versions,
            next_marker,
        })
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        code: CodeSource,
    ) -> ProviderResult<()> {
        self.record(PlatformCall::UpdateCode {
            function_name: function_name.to_string(),
            code: code.clone(),
        });

        let mut functions = self.functions.lock().unwrap();
        let state = functions
            .get_mut(function_name)
            .ok_or_else(|| ProviderError::FunctionNotFound {
                name: function_name.to_string(),
            })?;
        state.code = Some(code);
        Ok(())
    }

    async fn publish_version(&self, function_name: &str) -> ProviderResult<FunctionVersion> {
        self.record(PlatformCall::Publish {
            function_name: function_name.to_string(),
        });

        let mut functions = self.functions.lock().unwrap();
        let state = functions
            .get_mut(function_name)
            .ok_or_else(|| ProviderError::FunctionNotFound {
                name: function_name.to_string(),
            })?;
        let next = state
            .versions
            .iter()
            .filter_map(|v| v.version.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let published = FunctionVersion::new(
            next.to_string(),
            format!("arn:aws:lambda:us-east-1:000000000000:function:{function_name}:{next}"),
        );
        state.versions.push(published.clone());
        Ok(published)
    }
}

// ---------------------------------------------------------------------------
// MemoryCdn
// ---------------------------------------------------------------------------

/// A recorded successful or rejected `update_distribution_config` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionUpdate {
    pub distribution_id: String,
    pub if_match: String,
    pub config: serde_json::Value,
}

/// In-memory CDN with ETag-checked updates.
#[derive(Debug, Default)]
pub struct MemoryCdn {
    distributions: Mutex<HashMap<String, DistributionConfig>>,
    updates: Mutex<Vec<DistributionUpdate>>,
    etag_seq: AtomicU64,
}

impl MemoryCdn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a distribution at a known ETag.
    pub fn insert_distribution(&self, distribution_id: &str, etag: &str, config: serde_json::Value) {
        let mut distributions = self.distributions.lock().unwrap();
        distributions.insert(
            distribution_id.to_string(),
            DistributionConfig {
                etag: etag.to_string(),
                config,
            },
        );
    }

    /// Simulate a concurrent external edit: the document stays, the ETag changes.
    pub fn touch(&self, distribution_id: &str) -> Option<String> {
        let etag = self.next_etag();
        let mut distributions = self.distributions.lock().unwrap();
        let current = distributions.get_mut(distribution_id)?;
        current.etag = etag.clone();
        Some(etag)
    }

    /// Current state of a distribution.
    pub fn distribution(&self, distribution_id: &str) -> Option<DistributionConfig> {
        self.distributions
            .lock()
            .unwrap()
            .get(distribution_id)
            .cloned()
    }

    /// Every update attempt, in call order, including rejected ones.
    pub fn updates(&self) -> Vec<DistributionUpdate> {
        self.updates.lock().unwrap().clone()
    }

    fn next_etag(&self) -> String {
        format!("E{}", self.etag_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl CdnDistributions for MemoryCdn {
    async fn get_distribution_config(
        &self,
        distribution_id: &str,
    ) -> ProviderResult<DistributionConfig> {
        self.distribution(distribution_id)
            .ok_or_else(|| ProviderError::DistributionNotFound {
                id: distribution_id.to_string(),
            })
    }

    async fn update_distribution_config(
        &self,
        distribution_id: &str,
        if_match: &str,
        config: serde_json::Value,
    ) -> ProviderResult<String> {
        self.updates.lock().unwrap().push(DistributionUpdate {
            distribution_id: distribution_id.to_string(),
            if_match: if_match.to_string(),
            config: config.clone(),
        });

        let etag = self.next_etag();
        let mut distributions = self.distributions.lock().unwrap();
        let current = distributions
            .get_mut(distribution_id)
            .ok_or_else(|| ProviderError::DistributionNotFound {
                id: distribution_id.to_string(),
            })?;
        if current.etag != if_match {
            return Err(ProviderError::PreconditionFailed {
                expected: if_match.to_string(),
                actual: current.etag.clone(),
            });
        }
        current.etag = etag.clone();
        current.config = config;
        Ok(etag)
    }
}

// ---------------------------------------------------------------------------
// MemoryProviders
// ---------------------------------------------------------------------------

/// Which client a factory call constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    ObjectStore,
    FunctionPlatform,
    Cdn,
}

/// Factory handing out shared in-memory clients regardless of region.
///
/// Requested regions are recorded per client kind.
#[derive(Debug, Default)]
pub struct MemoryProviders {
    pub objects: Arc<MemoryObjectStore>,
    pub functions: Arc<MemoryFunctionPlatform>,
    pub cdn: Arc<MemoryCdn>,
    regions: Mutex<Vec<(ProviderKind, Option<String>)>>,
}

impl MemoryProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured function platform (e.g. with a small page size).
    pub fn with_functions(mut self, functions: MemoryFunctionPlatform) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    /// Regions requested for `kind`, in call order.
    pub fn requested_regions(&self, kind: ProviderKind) -> Vec<Option<String>> {
        self.regions
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, region)| region.clone())
            .collect()
    }

    /// Total state-changing calls across all three providers.
    pub fn mutating_call_count(&self) -> usize {
        self.objects.puts().len() + self.functions.mutating_calls().len() + self.cdn.updates().len()
    }

    fn record_region(&self, kind: ProviderKind, region: Option<&str>) {
        self.regions
            .lock()
            .unwrap()
            .push((kind, region.map(str::to_string)));
    }
}

impl ProviderFactory for MemoryProviders {
    fn object_store(&self, region: Option<&str>) -> ProviderResult<Arc<dyn ObjectStore>> {
        self.record_region(ProviderKind::ObjectStore, region);
        Ok(self.objects.clone())
    }

    fn function_platform(&self, region: Option<&str>) -> ProviderResult<Arc<dyn FunctionPlatform>> {
        self.record_region(ProviderKind::FunctionPlatform, region);
        Ok(self.functions.clone())
    }

    fn cdn(&self, region: Option<&str>) -> ProviderResult<Arc<dyn CdnDistributions>> {
        self.record_region(ProviderKind::Cdn, region);
        Ok(self.cdn.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_numbers_after_highest_version() {
        let platform = MemoryFunctionPlatform::new();
        platform.insert_function(
            "edge-auth",
            vec![
                FunctionVersion::new("$LATEST", "arn:edge-auth:$LATEST"),
                FunctionVersion::new("9", "arn:edge-auth:9"),
                FunctionVersion::new("10", "arn:edge-auth:10"),
            ],
        );

        let published = platform.publish_version("edge-auth").await.unwrap();
        assert_eq!(published.version, "11");
        assert!(published.function_arn.ends_with(":edge-auth:11"));
    }

    #[tokio::test]
    async fn touch_invalidates_previous_etag() {
        let cdn = MemoryCdn::new();
        cdn.insert_distribution("DIST", "E0", serde_json::json!({}));
        let new_etag = cdn.touch("DIST").unwrap();
        assert_ne!(new_etag, "E0");

        let err = cdn
            .update_distribution_config("DIST", "E0", serde_json::json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
        assert_eq!(cdn.distribution("DIST").unwrap().config, serde_json::json!({}));
    }
}
