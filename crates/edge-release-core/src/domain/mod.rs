//! Domain models for edge releases.
//!
//! Canonical definitions for the core entities:
//! - `ReleaseRequest`: validated request with its trigger list
//! - `Operation`: the four release steps and their required fields
//! - `TriggerSlot`: where on a cache behavior a function is attached
//! - `ReleaseReport`: per-trigger outcomes of one operation

pub mod error;
pub mod operation;
pub mod report;
pub mod request;
pub mod trigger;

// Re-export main types and errors
pub use error::{ReleaseError, Result, ValidationError};
pub use operation::{FieldRequirements, Operation};
pub use report::{
    DistributionWrite, OperationState, PlannedEffect, ReleaseReport, TriggerOutcome, TriggerStatus,
};
pub use request::{ReleaseRequest, TriggerSpec, REQUEST_FIELDS, TRIGGER_FIELDS};
pub use trigger::TriggerSlot;
