//! Request assembly from a config file and command-line overrides.
//!
//! Config files are JSON or TOML, picked by extension. Either way the file
//! is loaded as a loosely-typed document so that validation sees exactly
//! what the user wrote.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::{Operation, ReleaseError, Result, TriggerSlot};

/// Load a request document from `path`.
///
/// `.toml` files are parsed as TOML; anything else as JSON.
pub fn load_request_file(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| ReleaseError::ConfigFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        let doc: toml::Value = toml::from_str(&text).map_err(|e| ReleaseError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::to_value(doc)?)
    } else {
        serde_json::from_str(&text).map_err(|e| ReleaseError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Values supplied on the command line.
///
/// Top-level overrides replace whatever the config file says. Per-trigger
/// values build the single trigger used when no config file is given.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub dry_run: bool,
    pub region: Option<String>,
    pub s3_region: Option<String>,
    pub lambda_region: Option<String>,
    pub distribution_id: Option<String>,
    pub cache_behavior_path: Option<String>,
    pub bucket: Option<String>,
    pub auto_increment: Option<bool>,

    pub trigger_name: Option<String>,
    pub function_name: Option<String>,
    pub function_version: Option<String>,
    pub key: Option<String>,
    pub file_path: Option<PathBuf>,

    /// Keep only triggers bound to these slots. Empty keeps all.
    pub slots: Vec<TriggerSlot>,

    /// Base directory for relative `lambdaCodeFilePath` values.
    pub pwd: Option<PathBuf>,
}

impl RequestOverrides {
    fn has_trigger_fields(&self) -> bool {
        self.trigger_name.is_some()
            || self.function_name.is_some()
            || self.key.is_some()
            || self.file_path.is_some()
    }

    /// Merge these overrides onto `base` (or an empty request) for
    /// `operation`.
    ///
    /// `cwd` resolves relative artifact paths when no `pwd` override is set.
    pub fn apply(&self, operation: Operation, base: Option<Value>, cwd: &Path) -> Value {
        let from_file = base.is_some();
        let mut request = match base {
            Some(Value::Object(map)) => map,
            // Not an object: hand it to validation untouched.
            Some(other) => return other,
            None => Map::new(),
        };

        if self.dry_run {
            request.insert("dryRun".into(), Value::Bool(true));
        } else {
            request.entry("dryRun").or_insert(Value::Bool(false));
        }

        set(&mut request, "awsRegion", &self.region);
        set(&mut request, "s3Region", &self.s3_region);
        set(&mut request, "lambdaRegion", &self.lambda_region);
        set(&mut request, "cfDistributionID", &self.distribution_id);
        set(&mut request, "cacheBehaviorPath", &self.cache_behavior_path);
        set(&mut request, "lambdaCodeS3Bucket", &self.bucket);

        // An explicit version pins every trigger, so auto-increment is off.
        let auto_increment = if self.function_version.is_some() {
            Some(false)
        } else {
            self.auto_increment
        };
        match auto_increment {
            Some(flag) => {
                request.insert("autoIncrementVersion".into(), Value::Bool(flag));
            }
            None => {
                request
                    .entry("autoIncrementVersion")
                    .or_insert(Value::Bool(operation.auto_increment_by_default()));
            }
        }

        if operation == Operation::Activate {
            request
                .entry("cacheBehaviorPath")
                .or_insert(Value::String(crate::association::DEFAULT_BEHAVIOR_PATH.into()));
        }

        if from_file {
            if self.has_trigger_fields() {
                warn!("per-trigger options are ignored when a config file is given");
            }
        } else {
            request.insert(
                "cfTriggers".into(),
                Value::Array(vec![Value::Object(self.single_trigger())]),
            );
        }

        if let Some(Value::Array(triggers)) = request.get_mut("cfTriggers") {
            if !self.slots.is_empty() {
                triggers.retain(|trigger| {
                    trigger
                        .get("cfTriggerName")
                        .and_then(Value::as_str)
                        .and_then(|name| name.parse::<TriggerSlot>().ok())
                        .is_some_and(|slot| self.slots.contains(&slot))
                });
            }

            let base_dir = self.pwd.as_deref().unwrap_or(cwd);
            for trigger in triggers.iter_mut().filter_map(Value::as_object_mut) {
                if let Some(version) = &self.function_version {
                    trigger.insert(
                        "lambdaFunctionVersion".into(),
                        Value::String(version.clone()),
                    );
                }
                resolve_file_path(trigger, base_dir);
            }
        }

        Value::Object(request)
    }

    fn single_trigger(&self) -> Map<String, Value> {
        let mut trigger = Map::new();
        set(&mut trigger, "cfTriggerName", &self.trigger_name);
        set(&mut trigger, "lambdaFunctionName", &self.function_name);
        set(&mut trigger, "lambdaCodeS3Key", &self.key);
        if let Some(path) = &self.file_path {
            trigger.insert(
                "lambdaCodeFilePath".into(),
                Value::String(path.to_string_lossy().into_owned()),
            );
        }
        trigger
    }
}

fn set(map: &mut Map<String, Value>, field: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(field.to_string(), Value::String(value.clone()));
    }
}

fn resolve_file_path(trigger: &mut Map<String, Value>, base_dir: &Path) {
    let Some(Value::String(path)) = trigger.get("lambdaCodeFilePath") else {
        return;
    };
    let path = Path::new(path);
    if path.is_relative() {
        let absolute = base_dir.join(path).to_string_lossy().into_owned();
        trigger.insert("lambdaCodeFilePath".into(), Value::String(absolute));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cwd() -> PathBuf {
        PathBuf::from("/work")
    }

    #[test]
    fn test_flags_only_build_single_trigger() {
        let overrides = RequestOverrides {
            region: Some("us-east-1".into()),
            bucket: Some("artifacts".into()),
            function_name: Some("edge-auth".into()),
            key: Some("auth.zip".into()),
            file_path: Some(PathBuf::from("dist/auth.zip")),
            trigger_name: Some("viewer-request".into()),
            ..Default::default()
        };

        let request = overrides.apply(Operation::Stage, None, &cwd());
        assert_eq!(
            request,
            json!({
                "dryRun": false,
                "awsRegion": "us-east-1",
                "lambdaCodeS3Bucket": "artifacts",
                "autoIncrementVersion": true,
                "cfTriggers": [{
                    "cfTriggerName": "viewer-request",
                    "lambdaFunctionName": "edge-auth",
                    "lambdaCodeS3Key": "auth.zip",
                    "lambdaCodeFilePath": "/work/dist/auth.zip"
                }]
            })
        );
    }

    #[test]
    fn test_auto_increment_defaults_per_operation() {
        let overrides = RequestOverrides::default();
        for (operation, expected) in [
            (Operation::Stage, true),
            (Operation::Deploy, true),
            (Operation::Publish, false),
            (Operation::Activate, false),
        ] {
            let request = overrides.apply(operation, None, &cwd());
            assert_eq!(request["autoIncrementVersion"], expected, "{operation}");
        }
    }

    #[test]
    fn test_config_value_kept_unless_overridden() {
        let base = json!({"autoIncrementVersion": false, "dryRun": true, "cfTriggers": []});
        let request = RequestOverrides::default().apply(Operation::Deploy, Some(base.clone()), &cwd());
        assert_eq!(request["autoIncrementVersion"], false);
        assert_eq!(request["dryRun"], true);

        let overrides = RequestOverrides {
            auto_increment: Some(true),
            ..Default::default()
        };
        let request = overrides.apply(Operation::Deploy, Some(base), &cwd());
        assert_eq!(request["autoIncrementVersion"], true);
    }

    #[test]
    fn test_explicit_version_pins_every_trigger() {
        let base = json!({
            "autoIncrementVersion": true,
            "cfTriggers": [
                {"cfTriggerName": "viewer-request", "lambdaFunctionName": "a"},
                {"cfTriggerName": "origin-request", "lambdaFunctionName": "b", "lambdaFunctionVersion": "3"}
            ]
        });
        let overrides = RequestOverrides {
            function_version: Some("5".into()),
            auto_increment: Some(true),
            ..Default::default()
        };

        let request = overrides.apply(Operation::Activate, Some(base), &cwd());
        assert_eq!(request["autoIncrementVersion"], false);
        assert_eq!(request["cfTriggers"][0]["lambdaFunctionVersion"], "5");
        assert_eq!(request["cfTriggers"][1]["lambdaFunctionVersion"], "5");
    }

    #[test]
    fn test_activate_defaults_cache_behavior_path() {
        let request = RequestOverrides::default().apply(Operation::Activate, None, &cwd());
        assert_eq!(request["cacheBehaviorPath"], "default");

        let request = RequestOverrides::default().apply(Operation::Publish, None, &cwd());
        assert!(request.get("cacheBehaviorPath").is_none());

        let overrides = RequestOverrides {
            cache_behavior_path: Some("/api/*".into()),
            ..Default::default()
        };
        let request = overrides.apply(Operation::Activate, None, &cwd());
        assert_eq!(request["cacheBehaviorPath"], "/api/*");
    }

    #[test]
    fn test_slot_filter_keeps_matching_triggers() {
        let base = json!({"cfTriggers": [
            {"cfTriggerName": "viewer-request", "lambdaFunctionName": "a"},
            {"cfTriggerName": "origin-request", "lambdaFunctionName": "b"},
            {"cfTriggerName": "viewer-response", "lambdaFunctionName": "c"},
            {"lambdaFunctionName": "d"}
        ]});
        let overrides = RequestOverrides {
            slots: vec![TriggerSlot::ViewerRequest, TriggerSlot::ViewerResponse],
            ..Default::default()
        };

        let request = overrides.apply(Operation::Publish, Some(base), &cwd());
        let names: Vec<_> = request["cfTriggers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["lambdaFunctionName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_pwd_resolves_relative_paths_only() {
        let base = json!({"cfTriggers": [
            {"lambdaCodeFilePath": "build/a.zip"},
            {"lambdaCodeFilePath": "/abs/b.zip"}
        ]});
        let overrides = RequestOverrides {
            pwd: Some(PathBuf::from("/repo")),
            ..Default::default()
        };

        let request = overrides.apply(Operation::Stage, Some(base), &cwd());
        assert_eq!(request["cfTriggers"][0]["lambdaCodeFilePath"], "/repo/build/a.zip");
        assert_eq!(request["cfTriggers"][1]["lambdaCodeFilePath"], "/abs/b.zip");
    }

    #[test]
    fn test_non_object_base_passes_through() {
        let request = RequestOverrides::default().apply(Operation::Stage, Some(json!([1])), &cwd());
        assert_eq!(request, json!([1]));
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("release.json");
        std::fs::write(
            &json_path,
            r#"{"awsRegion": "us-east-1", "cfTriggers": [{"lambdaFunctionName": "a"}]}"#,
        )
        .unwrap();

        let toml_path = dir.path().join("release.toml");
        std::fs::write(
            &toml_path,
            r#"
awsRegion = "us-east-1"

[[cfTriggers]]
lambdaFunctionName = "a"
"#,
        )
        .unwrap();

        let from_json = load_request_file(&json_path).unwrap();
        let from_toml = load_request_file(&toml_path).unwrap();
        assert_eq!(from_json, from_toml);
    }

    #[test]
    fn test_load_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_request_file(&path).unwrap_err();
        assert!(matches!(err, ReleaseError::ConfigFile { .. }));
        assert!(err.to_string().contains("broken.json"));

        let missing = load_request_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ReleaseError::ConfigFile { .. }));
    }
}
