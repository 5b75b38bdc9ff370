//! Typed release request.
//!
//! A request arrives as a loosely-typed JSON document. It is checked by
//! [`crate::validation::validate_request`] first and only then decoded
//! into [`ReleaseRequest`], so decoding never has to report unknown or
//! missing fields itself.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::ValidationError;
use super::trigger::TriggerSlot;

/// Top-level fields a request may carry.
pub const REQUEST_FIELDS: &[&str] = &[
    "dryRun",
    "awsRegion",
    "s3Region",
    "lambdaRegion",
    "cfDistributionID",
    "cacheBehaviorPath",
    "autoIncrementVersion",
    "lambdaCodeS3Bucket",
    "cfTriggers",
];

/// Fields each `cfTriggers` entry may carry.
pub const TRIGGER_FIELDS: &[&str] = &[
    "cfTriggerName",
    "lambdaFunctionName",
    "lambdaFunctionVersion",
    "lambdaCodeS3Key",
    "lambdaCodeFilePath",
];

/// A release request after validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    #[serde(rename = "dryRun", default, deserialize_with = "nullable_bool")]
    pub dry_run: bool,

    #[serde(rename = "awsRegion", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(rename = "s3Region", default, skip_serializing_if = "Option::is_none")]
    pub s3_region: Option<String>,

    #[serde(rename = "lambdaRegion", default, skip_serializing_if = "Option::is_none")]
    pub lambda_region: Option<String>,

    #[serde(rename = "cfDistributionID", default, skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,

    #[serde(rename = "cacheBehaviorPath", default, skip_serializing_if = "Option::is_none")]
    pub cache_behavior_path: Option<String>,

    #[serde(rename = "autoIncrementVersion", default, deserialize_with = "nullable_bool")]
    pub auto_increment_version: bool,

    #[serde(rename = "lambdaCodeS3Bucket", default, skip_serializing_if = "Option::is_none")]
    pub code_bucket: Option<String>,

    #[serde(rename = "cfTriggers", default)]
    pub triggers: Vec<TriggerSpec>,
}

/// One edge function and where it should be attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "cfTriggerName", default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,

    #[serde(rename = "lambdaFunctionName", default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(
        rename = "lambdaFunctionVersion",
        default,
        deserialize_with = "version_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub function_version: Option<String>,

    #[serde(rename = "lambdaCodeS3Key", default, skip_serializing_if = "Option::is_none")]
    pub code_key: Option<String>,

    #[serde(rename = "lambdaCodeFilePath", default, skip_serializing_if = "Option::is_none")]
    pub code_file_path: Option<PathBuf>,
}

impl ReleaseRequest {
    /// Decode a request that has already passed validation.
    pub fn from_value(raw: &Value) -> Result<Self, ValidationError> {
        Self::deserialize(raw).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Region for object storage: `s3Region`, else `awsRegion`.
    pub fn object_store_region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.region.as_deref())
    }

    /// Region for the function platform: `lambdaRegion`, else `awsRegion`.
    pub fn function_region(&self) -> Option<&str> {
        self.lambda_region.as_deref().or(self.region.as_deref())
    }

    /// Region for the CDN client. Distributions are global, so only
    /// `awsRegion` applies.
    pub fn cdn_region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Deploys must ship bytes instead of an object pointer when the
    /// bucket and the function live in different regions.
    pub fn is_cross_region(&self) -> bool {
        matches!(
            (self.object_store_region(), self.function_region()),
            (Some(store), Some(function)) if store != function
        )
    }
}

impl TriggerSpec {
    /// The explicit version label, ignoring empty strings.
    pub fn explicit_version(&self) -> Option<&str> {
        self.function_version.as_deref().filter(|v| !v.is_empty())
    }

    /// Parse `cfTriggerName` into a slot, when present.
    pub fn slot(&self) -> Option<Result<TriggerSlot, ValidationError>> {
        self.trigger_name.as_deref().map(str::parse)
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &str {
        self.trigger_name
            .as_deref()
            .or(self.function_name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

fn nullable_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Version labels are strings on the wire but hand-written configs often
/// carry bare numbers.
fn version_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "lambdaFunctionVersion must be a string or number, got {other}"
        ))),
    }
}
