//! Release operations and the request fields each one requires.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Field names a request must carry to be accepted for an operation.
///
/// `top_level` names are checked on the request object, `trigger` names on
/// every entry of `cfTriggers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRequirements<'a> {
    pub top_level: &'a [&'a str],
    pub trigger: &'a [&'a str],
}

impl FieldRequirements<'static> {
    /// Only the structural checks: allowed fields and a non-empty trigger list.
    pub const NONE: FieldRequirements<'static> = FieldRequirements {
        top_level: &[],
        trigger: &[],
    };
}

/// The four release steps, in the order they are normally run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Upload local code bundles to object storage.
    Stage,
    /// Point each function's unpublished code at the staged bundle.
    Deploy,
    /// Snapshot the unpublished code as a new numbered version.
    Publish,
    /// Rebind distribution triggers to resolved version identifiers.
    Activate,
}

impl Operation {
    pub fn requirements(&self) -> FieldRequirements<'static> {
        match self {
            Operation::Stage => FieldRequirements {
                top_level: &["lambdaCodeS3Bucket"],
                trigger: &["lambdaFunctionName", "lambdaCodeS3Key", "lambdaCodeFilePath"],
            },
            Operation::Deploy => FieldRequirements {
                top_level: &["lambdaCodeS3Bucket"],
                trigger: &["lambdaFunctionName", "lambdaCodeS3Key"],
            },
            Operation::Publish => FieldRequirements {
                top_level: &[],
                trigger: &["lambdaFunctionName"],
            },
            Operation::Activate => FieldRequirements {
                top_level: &["cfDistributionID", "cacheBehaviorPath"],
                trigger: &["lambdaFunctionName"],
            },
        }
    }

    /// Whether auto-increment is on when the caller says nothing about it.
    pub fn auto_increment_by_default(&self) -> bool {
        matches!(self, Operation::Stage | Operation::Deploy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Stage => "stage",
            Operation::Deploy => "deploy",
            Operation::Publish => "publish",
            Operation::Activate => "activate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
