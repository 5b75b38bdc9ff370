//! Structured observability hooks for release operations.
//!
//! This module provides:
//! - The operation-scoped span `edge_release.operation`, attached to
//!   operation futures with `tracing::Instrument`
//! - Emission functions for key lifecycle events: start, planned provider
//!   request, dry-run skip, binding change, distribution write, finish
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! Rejections and per-trigger failures go out at `warn!`.

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{Operation, TriggerSlot};

/// Span tagging everything an operation logs with its release id.
pub fn release_span(release_id: &str, operation: Operation) -> tracing::Span {
    tracing::info_span!(
        "edge_release.operation",
        release_id = %release_id,
        operation = %operation,
    )
}

/// Emit event: operation started.
pub fn emit_operation_started(operation: Operation, trigger_count: usize, dry_run: bool) {
    info!(
        event = "operation.started",
        operation = %operation,
        trigger_count = trigger_count,
        dry_run = dry_run,
    );
}

/// Emit event: operation finished with per-status counts.
pub fn emit_operation_finished(
    operation: Operation,
    duration_ms: u64,
    applied: usize,
    skipped: usize,
    failed: usize,
) {
    info!(
        event = "operation.finished",
        operation = %operation,
        duration_ms = duration_ms,
        applied = applied,
        skipped = skipped,
        failed = failed,
    );
}

/// Emit event: the request body computed for a provider call.
///
/// Logged before the call is made, so it appears under dry-run too.
pub fn emit_request_planned(operation: Operation, trigger: &str, body: &Value) {
    info!(
        event = "trigger.planned",
        operation = %operation,
        trigger = %trigger,
        body = %body,
    );
}

/// Emit event: a mutating call suppressed by dry-run.
pub fn emit_dry_run_skip(operation: Operation, trigger: &str) {
    info!(event = "trigger.dry_run", operation = %operation, trigger = %trigger);
}

/// Emit event: a trigger failed; the operation continues with the rest.
pub fn emit_trigger_failed(operation: Operation, trigger: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "trigger.failed",
        operation = %operation,
        trigger = %trigger,
        error = %error,
    );
}

/// Emit event: a trigger left out of activation.
pub fn emit_trigger_skipped(trigger: &str, reason: &str) {
    warn!(event = "trigger.skipped", trigger = %trigger, reason = %reason);
}

/// Emit event: a binding changed in the working distribution document.
pub fn emit_binding_changed(
    cache_behavior_path: &str,
    slot: TriggerSlot,
    previous: Option<&str>,
    function_arn: &str,
) {
    info!(
        event = "binding.changed",
        cache_behavior_path = %cache_behavior_path,
        slot = %slot,
        previous = previous.unwrap_or("<none>"),
        function_arn = %function_arn,
    );
}

/// Emit event: the distribution document was written back.
pub fn emit_distribution_written(distribution_id: &str, if_match: &str, new_etag: &str) {
    info!(
        event = "distribution.written",
        distribution_id = %distribution_id,
        if_match = %if_match,
        new_etag = %new_etag,
    );
}

/// Emit event: request rejected by validation (warning level).
pub fn emit_validation_rejected(field: &str, reason: &str) {
    warn!(event = "validation.rejected", field = %field, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_span_metadata() {
        let span = release_span("release-1", Operation::Activate);
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "edge_release.operation");
        }
    }
}
