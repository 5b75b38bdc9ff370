//! Observability tests for release operation tracing.
//!
//! These tests verify that the structured events for each lifecycle step
//! can be emitted inside and outside an operation span.

use edge_release_core::obs::{
    emit_binding_changed, emit_distribution_written, emit_dry_run_skip, emit_operation_finished,
    emit_operation_started, emit_request_planned, emit_trigger_failed, emit_trigger_skipped,
    emit_validation_rejected, release_span,
};
use edge_release_core::{Operation, TriggerSlot};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_operation_lifecycle() {
    let _span = release_span("release-1", Operation::Deploy).entered();
    emit_operation_started(Operation::Deploy, 2, false);
    emit_request_planned(
        Operation::Deploy,
        "viewer-request",
        &json!({"FunctionName": "edge-auth", "S3Bucket": "artifacts", "S3Key": "auth-3.zip"}),
    );
    emit_operation_finished(Operation::Deploy, 12, 2, 0, 0);
}

#[traced_test]
#[test]
fn test_emit_dry_run_skip() {
    emit_dry_run_skip(Operation::Publish, "origin-request");
}

#[traced_test]
#[test]
fn test_emit_trigger_failed_and_skipped() {
    emit_trigger_failed(Operation::Stage, "viewer-request", &"artifact missing");
    emit_trigger_skipped("origin-response", "no published version");
}

#[traced_test]
#[test]
fn test_emit_binding_changed_without_previous() {
    emit_binding_changed("default", TriggerSlot::ViewerRequest, None, "arn:fn:3");
    emit_binding_changed(
        "/api/*",
        TriggerSlot::OriginRequest,
        Some("arn:fn:2"),
        "arn:fn:3",
    );
}

#[traced_test]
#[test]
fn test_emit_distribution_written() {
    emit_distribution_written("DIST", "E1", "E2");
}

#[traced_test]
#[test]
fn test_emit_validation_rejected() {
    emit_validation_rejected("lambdaRole", "unknown field: lambdaRole");
}

#[test]
fn test_nested_release_spans() {
    let _outer = release_span("release-outer", Operation::Stage).entered();
    {
        let _inner = release_span("release-inner", Operation::Deploy).entered();
    }
}
