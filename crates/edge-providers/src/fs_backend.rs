//! Filesystem-backed sandbox providers.
//!
//! Emulates the three provider services under one root directory so releases
//! can be rehearsed locally:
//!
//! ```text
//! <root>/objects/<bucket>/<key>
//! <root>/functions/<name>.json
//! <root>/distributions/<id>.json
//! ```
//!
//! Unknown functions behave as freshly created ones (only `$LATEST`).
//! Distribution files may omit `etag`; it is derived from the config content.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider_traits::*;

/// Versions per `list_versions` page.
pub const VERSION_PAGE_SIZE: usize = 50;

const DEFAULT_REGION: &str = "us-east-1";
const SANDBOX_ACCOUNT: &str = "000000000000";

/// Factory for sandbox providers rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsProviders {
    root: PathBuf,
}

impl FsProviders {
    /// Open (and create if needed) a sandbox rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> ProviderResult<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in ["objects", "functions", "distributions"] {
            std::fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a distribution config into the sandbox, returning its ETag.
    pub fn seed_distribution(
        &self,
        distribution_id: &str,
        config: serde_json::Value,
    ) -> ProviderResult<String> {
        let cdn = FsCdn {
            dir: self.root.join("distributions"),
        };
        let etag = config_etag(&config)?;
        cdn.store(
            distribution_id,
            &StoredDistribution {
                etag: Some(etag.clone()),
                config,
            },
        )?;
        Ok(etag)
    }
}

impl ProviderFactory for FsProviders {
    fn object_store(&self, _region: Option<&str>) -> ProviderResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(FsObjectStore {
            dir: self.root.join("objects"),
        }))
    }

    fn function_platform(&self, region: Option<&str>) -> ProviderResult<Arc<dyn FunctionPlatform>> {
        Ok(Arc::new(FsFunctionPlatform {
            dir: self.root.join("functions"),
            region: region.unwrap_or(DEFAULT_REGION).to_string(),
        }))
    }

    fn cdn(&self, _region: Option<&str>) -> ProviderResult<Arc<dyn CdnDistributions>> {
        Ok(Arc::new(FsCdn {
            dir: self.root.join("distributions"),
        }))
    }
}

/// Join `relative` onto `base`, refusing anything that could escape `base`.
fn confined_path(base: &Path, relative: &str) -> ProviderResult<PathBuf> {
    let rel = Path::new(relative);
    let escapes = relative.is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ProviderError::InvalidKey {
            key: relative.to_string(),
        });
    }
    Ok(base.join(rel))
}

/// Atomic write: temp file in the target directory, then rename.
fn write_atomic(path: &Path, data: &[u8]) -> ProviderResult<()> {
    let dir = path.parent().ok_or_else(|| ProviderError::InvalidKey {
        key: path.display().to_string(),
    })?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// [`write_atomic`] on the blocking pool.
async fn write_atomic_off_runtime(path: PathBuf, data: Vec<u8>) -> ProviderResult<()> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &data))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

async fn read_optional(path: &Path) -> ProviderResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn config_etag(config: &serde_json::Value) -> ProviderResult<String> {
    let bytes = serde_json::to_vec(config)?;
    Ok(sha256_hex(&bytes)[..16].to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// FsObjectStore
// ---------------------------------------------------------------------------

struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    fn object_path(&self, bucket: &str, key: &str) -> ProviderResult<PathBuf> {
        let bucket_dir = confined_path(&self.dir, bucket)?;
        confined_path(&bucket_dir, key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, mut body: ByteStream) -> ProviderResult<()> {
        let path = self.object_path(bucket, key)?;
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let bytes = data.len();
        write_atomic_off_runtime(path, data).await?;
        debug!(bucket = %bucket, key = %key, bytes, "sandbox object written");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ProviderResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        read_optional(&path)
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// FsFunctionPlatform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StoredCode {
    S3 { bucket: String, key: String },
    ZipFile { sha256: String, size: usize },
}

impl From<&CodeSource> for StoredCode {
    fn from(code: &CodeSource) -> Self {
        match code {
            CodeSource::S3 { bucket, key } => StoredCode::S3 {
                bucket: bucket.clone(),
                key: key.clone(),
            },
            CodeSource::ZipFile(bytes) => StoredCode::ZipFile {
                sha256: sha256_hex(bytes),
                size: bytes.len(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PublishedVersion {
    version: String,
    function_arn: String,
    code: Option<StoredCode>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FunctionRecord {
    code: Option<StoredCode>,
    #[serde(default)]
    versions: Vec<PublishedVersion>,
}

struct FsFunctionPlatform {
    dir: PathBuf,
    region: String,
}

impl FsFunctionPlatform {
    fn record_path(&self, function_name: &str) -> ProviderResult<PathBuf> {
        if function_name.contains('/') || function_name.contains('\\') {
            return Err(ProviderError::InvalidKey {
                key: function_name.to_string(),
            });
        }
        confined_path(&self.dir, &format!("{function_name}.json"))
    }

    fn arn(&self, function_name: &str, qualifier: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}:{}",
            self.region, SANDBOX_ACCOUNT, function_name, qualifier
        )
    }

    async fn load(&self, function_name: &str) -> ProviderResult<FunctionRecord> {
        let path = self.record_path(function_name)?;
        match read_optional(&path).await? {
            Some(data) => Ok(serde_json::from_slice(&data)?),
            None => Ok(FunctionRecord::default()),
        }
    }

    async fn store(&self, function_name: &str, record: &FunctionRecord) -> ProviderResult<()> {
        let path = self.record_path(function_name)?;
        write_atomic_off_runtime(path, serde_json::to_vec_pretty(record)?).await
    }
}

#[async_trait]
impl FunctionPlatform for FsFunctionPlatform {
    async fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> ProviderResult<VersionPage> {
        let record = self.load(function_name).await?;

        let mut all = vec![FunctionVersion::new(
            LATEST_VERSION,
            self.arn(function_name, LATEST_VERSION),
        )];
        all.extend(
            record
                .versions
                .into_iter()
                .map(|v| FunctionVersion::new(v.version, v.function_arn)),
        );

        let start = match marker {
            Some(token) => token
                .parse::<usize>()
                .ok()
                .filter(|offset| *offset <= all.len())
                .ok_or_else(|| ProviderError::InvalidToken {
                    token: token.to_string(),
                })?,
            None => 0,
        };
        let end = (start + VERSION_PAGE_SIZE).min(all.len());
        let next_marker = (end < all.len()).then(|| end.to_string());

        Ok(VersionPage {
            versions: all[start..end].to_vec(),
            next_marker,
        })
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        code: CodeSource,
    ) -> ProviderResult<()> {
        let mut record = self.load(function_name).await?;
        record.code = Some(StoredCode::from(&code));
        self.store(function_name, &record).await?;
        debug!(function = %function_name, code = ?code, "sandbox function code updated");
        Ok(())
    }

    async fn publish_version(&self, function_name: &str) -> ProviderResult<FunctionVersion> {
        let mut record = self.load(function_name).await?;
        let next = record
            .versions
            .iter()
            .filter_map(|v| v.version.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let version = next.to_string();
        let function_arn = self.arn(function_name, &version);
        record.versions.push(PublishedVersion {
            version: version.clone(),
            function_arn: function_arn.clone(),
            code: record.code.clone(),
        });
        self.store(function_name, &record).await?;
        Ok(FunctionVersion::new(version, function_arn))
    }
}

// ---------------------------------------------------------------------------
// FsCdn
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct StoredDistribution {
    #[serde(default)]
    etag: Option<String>,
    config: serde_json::Value,
}

struct FsCdn {
    dir: PathBuf,
}

impl FsCdn {
    fn path(&self, distribution_id: &str) -> ProviderResult<PathBuf> {
        if distribution_id.contains('/') || distribution_id.contains('\\') {
            return Err(ProviderError::InvalidKey {
                key: distribution_id.to_string(),
            });
        }
        confined_path(&self.dir, &format!("{distribution_id}.json"))
    }

    fn store(&self, distribution_id: &str, stored: &StoredDistribution) -> ProviderResult<()> {
        let path = self.path(distribution_id)?;
        write_atomic(&path, &serde_json::to_vec_pretty(stored)?)
    }

    async fn store_off_runtime(
        &self,
        distribution_id: &str,
        stored: &StoredDistribution,
    ) -> ProviderResult<()> {
        let path = self.path(distribution_id)?;
        write_atomic_off_runtime(path, serde_json::to_vec_pretty(stored)?).await
    }

    async fn load(&self, distribution_id: &str) -> ProviderResult<DistributionConfig> {
        let path = self.path(distribution_id)?;
        let data = read_optional(&path)
            .await?
            .ok_or_else(|| ProviderError::DistributionNotFound {
                id: distribution_id.to_string(),
            })?;
        let stored: StoredDistribution = serde_json::from_slice(&data)?;
        if !stored.config.is_object() {
            return Err(ProviderError::InvalidDocument(format!(
                "distribution {distribution_id}: config is not an object"
            )));
        }
        let etag = match stored.etag {
            Some(etag) => etag,
            None => config_etag(&stored.config)?,
        };
        Ok(DistributionConfig {
            etag,
            config: stored.config,
        })
    }
}

#[async_trait]
impl CdnDistributions for FsCdn {
    async fn get_distribution_config(
        &self,
        distribution_id: &str,
    ) -> ProviderResult<DistributionConfig> {
        self.load(distribution_id).await
    }

    async fn update_distribution_config(
        &self,
        distribution_id: &str,
        if_match: &str,
        config: serde_json::Value,
    ) -> ProviderResult<String> {
        let current = self.load(distribution_id).await?;
        if current.etag != if_match {
            return Err(ProviderError::PreconditionFailed {
                expected: if_match.to_string(),
                actual: current.etag,
            });
        }
        let etag = config_etag(&config)?;
        self.store_off_runtime(
            distribution_id,
            &StoredDistribution {
                etag: Some(etag.clone()),
                config,
            },
        )
        .await?;
        Ok(etag)
    }
}
