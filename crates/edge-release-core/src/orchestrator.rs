//! Release orchestration: stage, deploy, publish, activate.
//!
//! Every operation validates the raw request against its own field
//! requirements, then works through `cfTriggers` in declared order.
//!
//! Stage, deploy and publish isolate failures per trigger: one trigger's
//! provider error is recorded in the report and the next trigger still
//! runs. Activation is all-or-nothing. It resolves every trigger, reads the
//! distribution once, folds all bindings into that document and writes it
//! back once, conditioned on the ETag it read.
//!
//! Under dry-run every read still happens and every planned request body is
//! logged, but no mutating provider call is made.

use std::sync::Arc;

use edge_providers::{
    ByteStream, CodeSource, DistributionConfig, FunctionPlatform, ObjectStore, ProviderFactory,
};
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::Instrument;

use crate::association::{apply_binding, BindingOutcome, DistributionView, DEFAULT_BEHAVIOR_PATH};
use crate::domain::{
    DistributionWrite, Operation, PlannedEffect, ReleaseError, ReleaseReport, ReleaseRequest,
    Result, TriggerOutcome, TriggerSlot, TriggerSpec, TriggerStatus, ValidationError,
};
use crate::obs::{
    emit_binding_changed, emit_distribution_written, emit_dry_run_skip, emit_operation_finished,
    emit_operation_started, emit_request_planned, emit_trigger_failed, emit_trigger_skipped,
    release_span,
};
use crate::resolver::VersionResolver;
use crate::validation::validate_request;

const ZIP_SUFFIX: &str = ".zip";

/// Derive the object key for a versioned artifact.
///
/// With a version and a key ending in `.zip`, `-{version}` is inserted
/// before the suffix; any other key is used as given.
///
/// ```
/// use edge_release_core::orchestrator::versioned_key;
///
/// assert_eq!(versioned_key("root/a/b/c.zip", Some("2")), "root/a/b/c-2.zip");
/// assert_eq!(versioned_key("bundle.tar", Some("2")), "bundle.tar");
/// assert_eq!(versioned_key("c.zip", None), "c.zip");
/// ```
pub fn versioned_key(key: &str, version: Option<&str>) -> String {
    match (version, key.strip_suffix(ZIP_SUFFIX)) {
        (Some(version), Some(stem)) => format!("{stem}-{version}{ZIP_SUFFIX}"),
        _ => key.to_string(),
    }
}

/// Runs release operations against providers handed out by a factory.
pub struct ReleaseOrchestrator {
    providers: Arc<dyn ProviderFactory>,
}

impl ReleaseOrchestrator {
    pub fn new(providers: Arc<dyn ProviderFactory>) -> Self {
        Self { providers }
    }

    pub async fn run(&self, operation: Operation, raw: &Value) -> Result<ReleaseReport> {
        match operation {
            Operation::Stage => self.stage(raw).await,
            Operation::Deploy => self.deploy(raw).await,
            Operation::Publish => self.publish(raw).await,
            Operation::Activate => self.activate(raw).await,
        }
    }

    /// Upload each trigger's local artifact to `lambdaCodeS3Bucket`.
    pub async fn stage(&self, raw: &Value) -> Result<ReleaseReport> {
        let (request, report) = prepare(Operation::Stage, raw)?;
        let span = release_span(&report.release_id.to_string(), Operation::Stage);
        self.stage_all(&request, report).instrument(span).await
    }

    /// Point each function's unpublished code at its staged artifact.
    pub async fn deploy(&self, raw: &Value) -> Result<ReleaseReport> {
        let (request, report) = prepare(Operation::Deploy, raw)?;
        let span = release_span(&report.release_id.to_string(), Operation::Deploy);
        self.deploy_all(&request, report).instrument(span).await
    }

    /// Publish a new numbered version of each function.
    pub async fn publish(&self, raw: &Value) -> Result<ReleaseReport> {
        let (request, report) = prepare(Operation::Publish, raw)?;
        let span = release_span(&report.release_id.to_string(), Operation::Publish);
        self.publish_all(&request, report).instrument(span).await
    }

    /// Rebind distribution triggers to resolved function versions.
    ///
    /// # Errors
    ///
    /// Any provider error while resolving, reading or writing aborts the
    /// whole activation and is returned unchanged. A stale ETag surfaces as
    /// `ProviderError::PreconditionFailed`.
    pub async fn activate(&self, raw: &Value) -> Result<ReleaseReport> {
        let (request, report) = prepare(Operation::Activate, raw)?;
        let span = release_span(&report.release_id.to_string(), Operation::Activate);
        self.activate_all(&request, report).instrument(span).await
    }

    // ---- stage ----

    async fn stage_all(
        &self,
        request: &ReleaseRequest,
        mut report: ReleaseReport,
    ) -> Result<ReleaseReport> {
        emit_operation_started(Operation::Stage, request.triggers.len(), request.dry_run);
        let store = self.providers.object_store(request.object_store_region())?;
        let platform = self.providers.function_platform(request.function_region())?;

        for trigger in &request.triggers {
            let mut effect = PlannedEffect::default();
            let result = stage_trigger(
                request,
                trigger,
                store.as_ref(),
                platform.as_ref(),
                &mut effect,
            )
            .await;
            report.push(outcome(Operation::Stage, trigger, effect, result));
        }
        Ok(finish(report))
    }

    // ---- deploy ----

    async fn deploy_all(
        &self,
        request: &ReleaseRequest,
        mut report: ReleaseReport,
    ) -> Result<ReleaseReport> {
        emit_operation_started(Operation::Deploy, request.triggers.len(), request.dry_run);
        let platform = self.providers.function_platform(request.function_region())?;
        let store = if request.is_cross_region() {
            Some(self.providers.object_store(request.object_store_region())?)
        } else {
            None
        };

        for trigger in &request.triggers {
            let mut effect = PlannedEffect::default();
            let result = deploy_trigger(
                request,
                trigger,
                store.as_deref(),
                platform.as_ref(),
                &mut effect,
            )
            .await;
            report.push(outcome(Operation::Deploy, trigger, effect, result));
        }
        Ok(finish(report))
    }

    // ---- publish ----

    async fn publish_all(
        &self,
        request: &ReleaseRequest,
        mut report: ReleaseReport,
    ) -> Result<ReleaseReport> {
        emit_operation_started(Operation::Publish, request.triggers.len(), request.dry_run);
        let platform = self.providers.function_platform(request.function_region())?;

        for trigger in &request.triggers {
            let mut effect = PlannedEffect::default();
            let result = publish_trigger(request, trigger, platform.as_ref(), &mut effect).await;
            report.push(outcome(Operation::Publish, trigger, effect, result));
        }
        Ok(finish(report))
    }

    // ---- activate ----

    async fn activate_all(
        &self,
        request: &ReleaseRequest,
        mut report: ReleaseReport,
    ) -> Result<ReleaseReport> {
        emit_operation_started(Operation::Activate, request.triggers.len(), request.dry_run);
        let distribution_id = required(request.distribution_id.as_deref(), "cfDistributionID")?;
        let behavior_path = required(request.cache_behavior_path.as_deref(), "cacheBehaviorPath")?;

        let platform = self.providers.function_platform(request.function_region())?;
        let cdn = self.providers.cdn(request.cdn_region())?;

        let resolver = VersionResolver::new(platform.as_ref());
        let resolver = &resolver;
        let steps = join_all(request.triggers.iter().map(|trigger| {
            let explicit = if request.auto_increment_version {
                None
            } else {
                trigger.explicit_version()
            };
            async move { plan_binding(resolver, trigger, explicit).await }
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let DistributionConfig { etag, mut config } =
            cdn.get_distribution_config(distribution_id).await?;

        for (trigger, step) in request.triggers.iter().zip(steps) {
            let mut effect = PlannedEffect::default();
            let status = match step {
                BindingStep::Skip(reason) => {
                    emit_trigger_skipped(trigger.label(), &reason);
                    TriggerStatus::Skipped(reason)
                }
                BindingStep::Bind {
                    slot,
                    version,
                    function_arn,
                } => {
                    let status = match apply_binding(&mut config, behavior_path, slot, &function_arn) {
                        BindingOutcome::Updated { previous } => {
                            emit_binding_changed(
                                behavior_path,
                                slot,
                                previous.as_deref(),
                                &function_arn,
                            );
                            if request.dry_run {
                                TriggerStatus::DryRun
                            } else {
                                TriggerStatus::Applied
                            }
                        }
                        BindingOutcome::Unchanged => TriggerStatus::Unchanged,
                        BindingOutcome::SlotNotBound => {
                            let reason = format!(
                                "{slot} has no association on cache behavior {behavior_path} (bound: {})",
                                bound_slots(&mut config, behavior_path)
                            );
                            emit_trigger_skipped(trigger.label(), &reason);
                            TriggerStatus::Skipped(reason)
                        }
                        BindingOutcome::BehaviorNotFound => {
                            let reason = format!(
                                "cache behavior {behavior_path} not found (known: {})",
                                known_behaviors(&mut config)
                            );
                            emit_trigger_skipped(trigger.label(), &reason);
                            TriggerStatus::Skipped(reason)
                        }
                    };
                    effect.version = version;
                    effect.function_arn = Some(function_arn);
                    status
                }
            };
            report.push(TriggerOutcome {
                trigger: trigger.label().to_string(),
                function_name: trigger.function_name.clone(),
                effect,
                result: Ok(status),
            });
        }

        emit_request_planned(
            Operation::Activate,
            distribution_id,
            &json!({
                "Id": distribution_id,
                "IfMatch": etag,
                "DistributionConfig": config,
            }),
        );
        if request.dry_run {
            emit_dry_run_skip(Operation::Activate, distribution_id);
        } else {
            let new_etag = cdn
                .update_distribution_config(distribution_id, &etag, config)
                .await?;
            emit_distribution_written(distribution_id, &etag, &new_etag);
            report.distribution_write = Some(DistributionWrite {
                distribution_id: distribution_id.to_string(),
                if_match: etag,
                new_etag,
            });
        }

        Ok(finish(report))
    }
}

/// Slots with an association on the behavior at `path`, for skip reasons.
fn bound_slots(config: &mut Value, path: &str) -> String {
    let mut view = DistributionView::new(config);
    let slots: Vec<String> = view
        .behavior(path)
        .map(|behavior| behavior.bound_slots())
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect();
    if slots.is_empty() {
        "none".to_string()
    } else {
        slots.join(", ")
    }
}

/// Every cache behavior path the document can be bound on.
fn known_behaviors(config: &mut Value) -> String {
    let view = DistributionView::new(config);
    std::iter::once(DEFAULT_BEHAVIOR_PATH.to_string())
        .chain(view.path_patterns())
        .collect::<Vec<_>>()
        .join(", ")
}

/// What activation will do for one trigger once the document is read.
enum BindingStep {
    Skip(String),
    Bind {
        slot: TriggerSlot,
        version: Option<String>,
        function_arn: String,
    },
}

async fn plan_binding(
    resolver: &VersionResolver<'_>,
    trigger: &TriggerSpec,
    explicit: Option<&str>,
) -> Result<BindingStep> {
    let slot = match trigger.slot() {
        None => return Ok(BindingStep::Skip("no cfTriggerName".to_string())),
        Some(Err(err)) => return Ok(BindingStep::Skip(err.to_string())),
        Some(Ok(slot)) => slot,
    };
    let function_name = required(trigger.function_name.as_deref(), "lambdaFunctionName")?;

    let resolved = resolver.resolve(function_name, explicit).await?;
    match resolved.function_arn {
        Some(function_arn) => Ok(BindingStep::Bind {
            slot,
            version: resolved.version,
            function_arn,
        }),
        None => Ok(BindingStep::Skip(format!(
            "no published version of {function_name} matches {}",
            explicit.unwrap_or("latest")
        ))),
    }
}

async fn stage_trigger(
    request: &ReleaseRequest,
    trigger: &TriggerSpec,
    store: &dyn ObjectStore,
    platform: &dyn FunctionPlatform,
    effect: &mut PlannedEffect,
) -> Result<TriggerStatus> {
    let bucket = required(request.code_bucket.as_deref(), "lambdaCodeS3Bucket")?;
    let function_name = required(trigger.function_name.as_deref(), "lambdaFunctionName")?;
    let key = required(trigger.code_key.as_deref(), "lambdaCodeS3Key")?;
    let path = trigger
        .code_file_path
        .as_deref()
        .ok_or_else(|| missing("lambdaCodeFilePath"))?;

    let version = target_version(request, trigger, function_name, platform).await?;
    let key = versioned_key(key, version.as_deref());
    effect.version = version;
    effect.bucket = Some(bucket.to_string());
    effect.key = Some(key.clone());

    emit_request_planned(
        Operation::Stage,
        trigger.label(),
        &json!({"Bucket": bucket, "Key": key, "Body": path.display().to_string()}),
    );
    if request.dry_run {
        emit_dry_run_skip(Operation::Stage, trigger.label());
        return Ok(TriggerStatus::DryRun);
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| ReleaseError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
    let body: ByteStream = Box::pin(file);
    store.put_object(bucket, &key, body).await?;
    Ok(TriggerStatus::Applied)
}

async fn deploy_trigger(
    request: &ReleaseRequest,
    trigger: &TriggerSpec,
    cross_region_store: Option<&dyn ObjectStore>,
    platform: &dyn FunctionPlatform,
    effect: &mut PlannedEffect,
) -> Result<TriggerStatus> {
    let bucket = required(request.code_bucket.as_deref(), "lambdaCodeS3Bucket")?;
    let function_name = required(trigger.function_name.as_deref(), "lambdaFunctionName")?;
    let key = required(trigger.code_key.as_deref(), "lambdaCodeS3Key")?;

    let version = target_version(request, trigger, function_name, platform).await?;
    let key = versioned_key(key, version.as_deref());
    effect.version = version;
    effect.bucket = Some(bucket.to_string());
    effect.key = Some(key.clone());

    let body = match cross_region_store {
        Some(_) => json!({"FunctionName": function_name, "ZipFile": format!("s3://{bucket}/{key}")}),
        None => json!({"FunctionName": function_name, "S3Bucket": bucket, "S3Key": key}),
    };
    emit_request_planned(Operation::Deploy, trigger.label(), &body);
    if request.dry_run {
        emit_dry_run_skip(Operation::Deploy, trigger.label());
        return Ok(TriggerStatus::DryRun);
    }

    let code = match cross_region_store {
        Some(store) => CodeSource::ZipFile(store.get_object(bucket, &key).await?),
        None => CodeSource::S3 {
            bucket: bucket.to_string(),
            key,
        },
    };
    platform.update_function_code(function_name, code).await?;
    Ok(TriggerStatus::Applied)
}

async fn publish_trigger(
    request: &ReleaseRequest,
    trigger: &TriggerSpec,
    platform: &dyn FunctionPlatform,
    effect: &mut PlannedEffect,
) -> Result<TriggerStatus> {
    let function_name = required(trigger.function_name.as_deref(), "lambdaFunctionName")?;

    emit_request_planned(
        Operation::Publish,
        trigger.label(),
        &json!({"FunctionName": function_name}),
    );
    if request.dry_run {
        emit_dry_run_skip(Operation::Publish, trigger.label());
        return Ok(TriggerStatus::DryRun);
    }

    let published = platform.publish_version(function_name).await?;
    effect.version = Some(published.version);
    effect.function_arn = Some(published.function_arn);
    Ok(TriggerStatus::Applied)
}

/// The version an artifact is labelled with: the next number to be
/// published when auto-incrementing, else the trigger's explicit label.
async fn target_version(
    request: &ReleaseRequest,
    trigger: &TriggerSpec,
    function_name: &str,
    platform: &dyn FunctionPlatform,
) -> Result<Option<String>> {
    if request.auto_increment_version {
        let next = VersionResolver::new(platform)
            .next_version(function_name)
            .await?;
        Ok(Some(next.to_string()))
    } else {
        Ok(trigger.explicit_version().map(str::to_string))
    }
}

fn prepare(operation: Operation, raw: &Value) -> Result<(ReleaseRequest, ReleaseReport)> {
    validate_request(raw, &operation.requirements())?;
    let request = ReleaseRequest::from_value(raw)?;
    let report = ReleaseReport::begin(operation, request.dry_run);
    Ok((request, report))
}

fn outcome(
    operation: Operation,
    trigger: &TriggerSpec,
    effect: PlannedEffect,
    result: Result<TriggerStatus>,
) -> TriggerOutcome {
    if let Err(err) = &result {
        emit_trigger_failed(operation, trigger.label(), err);
    }
    TriggerOutcome {
        trigger: trigger.label().to_string(),
        function_name: trigger.function_name.clone(),
        effect,
        result,
    }
}

fn finish(mut report: ReleaseReport) -> ReleaseReport {
    report.finish();
    emit_operation_finished(
        report.operation,
        report.duration_ms(),
        report.count(&TriggerStatus::Applied),
        report.skipped_count(),
        report.failed_count(),
    );
    report
}

// Validation guarantees these; the typed request still carries Options.
fn required<'r>(value: Option<&'r str>, field: &str) -> Result<&'r str> {
    value.ok_or_else(|| missing(field))
}

fn missing(field: &str) -> ReleaseError {
    ReleaseError::ConfigInvalid(ValidationError::MissingField {
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_providers::fakes::MemoryProviders;
    use tracing_test::traced_test;

    #[test]
    fn test_versioned_key_only_rewrites_zip_suffix() {
        assert_eq!(versioned_key("root/a/b/c.zip", Some("2")), "root/a/b/c-2.zip");
        assert_eq!(versioned_key("c.ZIP", Some("2")), "c.ZIP");
        assert_eq!(versioned_key("c.zip.bak", Some("2")), "c.zip.bak");
        assert_eq!(versioned_key("c.zip", None), "c.zip");
        assert_eq!(versioned_key(".zip", Some("1")), "-1.zip");
    }

    #[test]
    fn test_missing_field_is_config_invalid() {
        let err = required(None, "cfDistributionID").unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::ConfigInvalid(ValidationError::MissingField { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_operation_events_carry_release_span() {
        let orchestrator = ReleaseOrchestrator::new(Arc::new(MemoryProviders::new()));
        let report = orchestrator
            .publish(&json!({"dryRun": true, "cfTriggers": [{"lambdaFunctionName": "edge-fn"}]}))
            .await
            .expect("publish");

        assert!(logs_contain("edge_release.operation"));
        assert!(logs_contain(&report.release_id.to_string()));
        assert!(logs_contain("operation.started"));
    }
}
