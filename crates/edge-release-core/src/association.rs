//! Trigger bindings inside a distribution configuration document.
//!
//! The document is kept as a `serde_json::Value` so that every field this
//! crate does not understand survives the read-modify-write cycle. The views
//! here only touch the few paths a binding lives on:
//!
//! ```text
//! DefaultCacheBehavior.LambdaFunctionAssociations.Items[EventType].LambdaFunctionARN
//! CacheBehaviors.Items[PathPattern].LambdaFunctionAssociations.Items[EventType].LambdaFunctionARN
//! ```

use serde_json::Value;

use crate::domain::TriggerSlot;

/// Sentinel cache behavior path selecting the default behavior.
pub const DEFAULT_BEHAVIOR_PATH: &str = "default";

const DEFAULT_BEHAVIOR: &str = "DefaultCacheBehavior";
const CACHE_BEHAVIORS: &str = "CacheBehaviors";
const ITEMS: &str = "Items";
const PATH_PATTERN: &str = "PathPattern";
const ASSOCIATIONS: &str = "LambdaFunctionAssociations";
const EVENT_TYPE: &str = "EventType";
const FUNCTION_ARN: &str = "LambdaFunctionARN";

/// Mutable view over a distribution configuration document.
pub struct DistributionView<'a> {
    config: &'a mut Value,
}

impl<'a> DistributionView<'a> {
    pub fn new(config: &'a mut Value) -> Self {
        Self { config }
    }

    pub fn default_behavior(&mut self) -> Option<BehaviorView<'_>> {
        BehaviorView::wrap(self.config.get_mut(DEFAULT_BEHAVIOR)?)
    }

    /// The non-default behavior whose `PathPattern` equals `pattern` exactly.
    pub fn behavior_by_pattern(&mut self, pattern: &str) -> Option<BehaviorView<'_>> {
        let behavior = self
            .config
            .get_mut(CACHE_BEHAVIORS)?
            .get_mut(ITEMS)?
            .as_array_mut()?
            .iter_mut()
            .find(|b| b.get(PATH_PATTERN).and_then(Value::as_str) == Some(pattern))?;
        BehaviorView::wrap(behavior)
    }

    /// Resolve a cache behavior path, honouring the `"default"` sentinel.
    pub fn behavior(&mut self, path: &str) -> Option<BehaviorView<'_>> {
        if path == DEFAULT_BEHAVIOR_PATH {
            self.default_behavior()
        } else {
            self.behavior_by_pattern(path)
        }
    }

    /// Path patterns of all non-default behaviors, in document order.
    pub fn path_patterns(&self) -> Vec<String> {
        self.config
            .get(CACHE_BEHAVIORS)
            .and_then(|b| b.get(ITEMS))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|b| b.get(PATH_PATTERN).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Result of setting a binding on one behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange {
    Updated { previous: Option<String> },
    Unchanged,
    /// The behavior has no association entry for the slot.
    SlotNotBound,
}

/// Mutable view over a single cache behavior.
pub struct BehaviorView<'a> {
    behavior: &'a mut Value,
}

impl<'a> BehaviorView<'a> {
    fn wrap(behavior: &'a mut Value) -> Option<Self> {
        if behavior.is_object() {
            Some(Self { behavior })
        } else {
            None
        }
    }

    fn associations(&self) -> Option<&Vec<Value>> {
        self.behavior.get(ASSOCIATIONS)?.get(ITEMS)?.as_array()
    }

    fn association_mut(&mut self, slot: TriggerSlot) -> Option<&mut Value> {
        self.behavior
            .get_mut(ASSOCIATIONS)?
            .get_mut(ITEMS)?
            .as_array_mut()?
            .iter_mut()
            .find(|item| item.get(EVENT_TYPE).and_then(Value::as_str) == Some(slot.as_str()))
    }

    /// The function ARN currently bound to `slot`.
    pub fn binding(&self, slot: TriggerSlot) -> Option<&str> {
        self.associations()?
            .iter()
            .find(|item| item.get(EVENT_TYPE).and_then(Value::as_str) == Some(slot.as_str()))?
            .get(FUNCTION_ARN)?
            .as_str()
    }

    /// Slots that have an association entry on this behavior.
    pub fn bound_slots(&self) -> Vec<TriggerSlot> {
        TriggerSlot::ALL
            .into_iter()
            .filter(|slot| {
                self.associations().is_some_and(|items| {
                    items
                        .iter()
                        .any(|i| i.get(EVENT_TYPE).and_then(Value::as_str) == Some(slot.as_str()))
                })
            })
            .collect()
    }

    /// Point the association for `slot` at `function_arn`.
    ///
    /// Only an existing association entry is changed; a slot without one is
    /// reported, not created.
    pub fn set_binding(&mut self, slot: TriggerSlot, function_arn: &str) -> BindingChange {
        let Some(item) = self.association_mut(slot) else {
            return BindingChange::SlotNotBound;
        };
        let current = item.get(FUNCTION_ARN).and_then(Value::as_str);
        if current == Some(function_arn) {
            return BindingChange::Unchanged;
        }
        let previous = current.map(str::to_string);
        match item.as_object_mut() {
            Some(entry) => {
                entry.insert(FUNCTION_ARN.to_string(), Value::String(function_arn.to_string()));
                BindingChange::Updated { previous }
            }
            None => BindingChange::SlotNotBound,
        }
    }
}

/// Result of applying one binding to a whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    Updated { previous: Option<String> },
    Unchanged,
    SlotNotBound,
    BehaviorNotFound,
}

impl From<BindingChange> for BindingOutcome {
    fn from(change: BindingChange) -> Self {
        match change {
            BindingChange::Updated { previous } => BindingOutcome::Updated { previous },
            BindingChange::Unchanged => BindingOutcome::Unchanged,
            BindingChange::SlotNotBound => BindingOutcome::SlotNotBound,
        }
    }
}

/// Bind `function_arn` to `slot` on the behavior selected by
/// `cache_behavior_path`. An unknown path leaves the document untouched.
pub fn apply_binding(
    config: &mut Value,
    cache_behavior_path: &str,
    slot: TriggerSlot,
    function_arn: &str,
) -> BindingOutcome {
    let mut view = DistributionView::new(config);
    match view.behavior(cache_behavior_path) {
        Some(mut behavior) => behavior.set_binding(slot, function_arn).into(),
        None => BindingOutcome::BehaviorNotFound,
    }
}
