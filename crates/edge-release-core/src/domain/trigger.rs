//! Edge trigger slots on a cache behavior.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// The four points in the request/response cycle where an edge function
/// may be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSlot {
    ViewerRequest,
    OriginRequest,
    OriginResponse,
    ViewerResponse,
}

impl TriggerSlot {
    pub const ALL: [TriggerSlot; 4] = [
        TriggerSlot::ViewerRequest,
        TriggerSlot::OriginRequest,
        TriggerSlot::OriginResponse,
        TriggerSlot::ViewerResponse,
    ];

    /// The `EventType` name used in distribution documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSlot::ViewerRequest => "viewer-request",
            TriggerSlot::OriginRequest => "origin-request",
            TriggerSlot::OriginResponse => "origin-response",
            TriggerSlot::ViewerResponse => "viewer-response",
        }
    }
}

impl fmt::Display for TriggerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerSlot {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownTriggerSlot { name: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names_roundtrip() {
        for slot in TriggerSlot::ALL {
            assert_eq!(slot.as_str().parse::<TriggerSlot>().unwrap(), slot);
            assert_eq!(
                serde_json::to_value(slot).unwrap(),
                serde_json::json!(slot.as_str())
            );
        }
    }

    #[test]
    fn test_unknown_slot_rejected() {
        let err = "viewer_request".parse::<TriggerSlot>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownTriggerSlot {
                name: "viewer_request".to_string()
            }
        );
    }
}
