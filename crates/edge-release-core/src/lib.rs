//! edge-release Core Library
//!
//! Versioned releases of edge functions: stage code bundles, point
//! functions at them, publish numbered versions and rebind CDN triggers.
//! Providers are injected through [`edge_providers::ProviderFactory`].

pub mod association;
pub mod config;
pub mod domain;
pub mod obs;
pub mod orchestrator;
pub mod resolver;
pub mod telemetry;
pub mod validation;

pub use association::{
    apply_binding, BehaviorView, BindingChange, BindingOutcome, DistributionView,
    DEFAULT_BEHAVIOR_PATH,
};
pub use config::{load_request_file, RequestOverrides};
pub use domain::{
    DistributionWrite, FieldRequirements, Operation, OperationState, PlannedEffect, ReleaseError,
    ReleaseReport, ReleaseRequest, Result, TriggerOutcome, TriggerSlot, TriggerSpec,
    TriggerStatus, ValidationError,
};
pub use orchestrator::{versioned_key, ReleaseOrchestrator};
pub use resolver::{select_latest, ResolvedVersion, VersionResolver};
pub use validation::{is_valid, validate_request};

/// Version of this crate, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
