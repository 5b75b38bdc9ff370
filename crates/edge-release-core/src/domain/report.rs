//! Outcome of one release operation across all of its triggers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::{ReleaseError, Result};
use super::operation::Operation;

/// What was (or, under dry-run, would have been) sent for one trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlannedEffect {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_arn: Option<String>,
}

/// Terminal state of a single trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TriggerStatus {
    /// The mutating call was made and accepted.
    Applied,
    /// The document already carried the target binding.
    Unchanged,
    /// Planned only; dry-run suppressed the mutating call.
    DryRun,
    /// Nothing to do for this trigger.
    Skipped(String),
}

#[derive(Debug)]
pub struct TriggerOutcome {
    pub trigger: String,
    pub function_name: Option<String>,
    pub effect: PlannedEffect,
    pub result: std::result::Result<TriggerStatus, ReleaseError>,
}

impl TriggerOutcome {
    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }

    pub fn status(&self) -> Option<&TriggerStatus> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ReleaseError> {
        self.result.as_ref().err()
    }
}

/// The single conditional write made by an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionWrite {
    pub distribution_id: String,
    pub if_match: String,
    pub new_etag: String,
}

/// Overall operation state, derived from the trigger outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Done,
    Failed,
}

#[derive(Debug)]
pub struct ReleaseReport {
    pub release_id: Uuid,
    pub operation: Operation,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub triggers: Vec<TriggerOutcome>,
    pub distribution_write: Option<DistributionWrite>,
}

impl ReleaseReport {
    pub fn begin(operation: Operation, dry_run: bool) -> Self {
        Self {
            release_id: Uuid::new_v4(),
            operation,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            triggers: Vec::new(),
            distribution_write: None,
        }
    }

    pub fn push(&mut self, outcome: TriggerOutcome) {
        self.triggers.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn state(&self) -> OperationState {
        if self.triggers.iter().any(TriggerOutcome::is_failed) {
            OperationState::Failed
        } else {
            OperationState::Done
        }
    }

    pub fn failed_count(&self) -> usize {
        self.triggers.iter().filter(|t| t.is_failed()).count()
    }

    pub fn count(&self, status: &TriggerStatus) -> usize {
        self.triggers
            .iter()
            .filter(|t| t.status() == Some(status))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.triggers
            .iter()
            .filter(|t| matches!(t.status(), Some(TriggerStatus::Skipped(_))))
            .count()
    }

    /// Surface the first trigger failure, in declared order, unchanged.
    pub fn into_result(mut self) -> Result<Self> {
        let Some(index) = self.triggers.iter().position(TriggerOutcome::is_failed) else {
            return Ok(self);
        };
        match self.triggers.swap_remove(index).result {
            Err(err) => Err(err),
            Ok(_) => Ok(self),
        }
    }

    /// JSON summary for machine-readable output.
    pub fn summary(&self) -> Value {
        let triggers: Vec<Value> = self
            .triggers
            .iter()
            .map(|t| {
                let outcome = match &t.result {
                    Ok(status) => json!(status),
                    Err(err) => json!({"status": "failed", "reason": err.to_string()}),
                };
                json!({
                    "trigger": t.trigger,
                    "function_name": t.function_name,
                    "effect": t.effect,
                    "outcome": outcome,
                })
            })
            .collect();

        json!({
            "release_id": self.release_id,
            "operation": self.operation,
            "dry_run": self.dry_run,
            "state": self.state(),
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "triggers": triggers,
            "distribution_write": self.distribution_write,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_providers::ProviderError;

    fn outcome(trigger: &str, result: std::result::Result<TriggerStatus, ReleaseError>) -> TriggerOutcome {
        TriggerOutcome {
            trigger: trigger.to_string(),
            function_name: Some(format!("{trigger}-fn")),
            effect: PlannedEffect::default(),
            result,
        }
    }

    #[test]
    fn test_all_applied_is_done() {
        let mut report = ReleaseReport::begin(Operation::Publish, false);
        report.push(outcome("a", Ok(TriggerStatus::Applied)));
        report.push(outcome("b", Ok(TriggerStatus::Skipped("nothing".into()))));
        report.finish();

        assert_eq!(report.state(), OperationState::Done);
        assert_eq!(report.count(&TriggerStatus::Applied), 1);
        assert_eq!(report.skipped_count(), 1);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_first_failure_surfaces_unchanged() {
        let mut report = ReleaseReport::begin(Operation::Deploy, false);
        report.push(outcome("a", Ok(TriggerStatus::Applied)));
        report.push(outcome(
            "b",
            Err(ProviderError::FunctionNotFound { name: "b-fn".into() }.into()),
        ));
        report.push(outcome(
            "c",
            Err(ProviderError::FunctionNotFound { name: "c-fn".into() }.into()),
        ));

        assert_eq!(report.state(), OperationState::Failed);
        assert_eq!(report.failed_count(), 2);

        let err = report.into_result().unwrap_err();
        match err.provider_error() {
            Some(ProviderError::FunctionNotFound { name }) => assert_eq!(name, "b-fn"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_summary_shape() {
        let mut report = ReleaseReport::begin(Operation::Stage, true);
        report.push(outcome("a", Ok(TriggerStatus::DryRun)));
        report.finish();

        let summary = report.summary();
        assert_eq!(summary["operation"], "stage");
        assert_eq!(summary["state"], "done");
        assert_eq!(summary["triggers"][0]["outcome"]["status"], "dry_run");
    }
}
