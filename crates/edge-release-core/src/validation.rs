//! Release request validation.
//!
//! Checks the raw request document before it is decoded:
//! 1. The request is an object carrying only known top-level fields.
//! 2. Every required top-level field is present.
//! 3. `cfTriggers` is a non-empty array of objects.
//! 4. Each trigger carries only known fields and every required one.
//!
//! Presence means the key exists: a JSON `null`, an empty string or `false`
//! all satisfy a requirement. Each rejection is logged with the offending
//! field before the error is returned.

use serde_json::{Map, Value};

use crate::domain::{FieldRequirements, ValidationError, REQUEST_FIELDS, TRIGGER_FIELDS};
use crate::obs::emit_validation_rejected;

/// Validate a raw release request against the given requirements.
///
/// # Errors
///
/// The first violation found, in the order listed in the module docs.
pub fn validate_request(
    raw: &Value,
    required: &FieldRequirements<'_>,
) -> Result<(), ValidationError> {
    check(raw, required).map_err(|err| {
        let field = match &err {
            ValidationError::UnknownField { field }
            | ValidationError::MissingField { field }
            | ValidationError::UnknownTriggerField { field, .. }
            | ValidationError::MissingTriggerField { field, .. } => field.as_str(),
            ValidationError::NoTriggers | ValidationError::TriggerNotAnObject { .. } => {
                "cfTriggers"
            }
            _ => "<request>",
        };
        emit_validation_rejected(field, &err.to_string());
        err
    })
}

/// Boolean form of [`validate_request`].
pub fn is_valid(raw: &Value, required: &FieldRequirements<'_>) -> bool {
    validate_request(raw, required).is_ok()
}

fn check(raw: &Value, required: &FieldRequirements<'_>) -> Result<(), ValidationError> {
    let request = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    if let Some(field) = unknown_field(request, REQUEST_FIELDS) {
        return Err(ValidationError::UnknownField { field });
    }
    if let Some(field) = missing_field(request, required.top_level) {
        return Err(ValidationError::MissingField { field });
    }

    let triggers = request
        .get("cfTriggers")
        .and_then(Value::as_array)
        .filter(|triggers| !triggers.is_empty())
        .ok_or(ValidationError::NoTriggers)?;

    for (index, trigger) in triggers.iter().enumerate() {
        let trigger = trigger
            .as_object()
            .ok_or(ValidationError::TriggerNotAnObject { index })?;

        if let Some(field) = unknown_field(trigger, TRIGGER_FIELDS) {
            return Err(ValidationError::UnknownTriggerField { index, field });
        }
        if let Some(field) = missing_field(trigger, required.trigger) {
            return Err(ValidationError::MissingTriggerField { index, field });
        }
    }

    Ok(())
}

fn unknown_field(object: &Map<String, Value>, allowed: &[&str]) -> Option<String> {
    object
        .keys()
        .find(|key| !allowed.contains(&key.as_str()))
        .cloned()
}

fn missing_field(object: &Map<String, Value>, required: &[&str]) -> Option<String> {
    required
        .iter()
        .find(|field| !object.contains_key(**field))
        .map(|field| field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operation;
    use serde_json::json;
    use tracing_test::traced_test;

    fn stage_request() -> Value {
        json!({
            "awsRegion": "us-east-1",
            "lambdaCodeS3Bucket": "artifacts",
            "cfTriggers": [{
                "cfTriggerName": "viewer-request",
                "lambdaFunctionName": "edge-auth",
                "lambdaCodeS3Key": "auth.zip",
                "lambdaCodeFilePath": "dist/auth.zip"
            }]
        })
    }

    #[test]
    fn test_valid_stage_request() {
        assert!(is_valid(&stage_request(), &Operation::Stage.requirements()));
    }

    #[test]
    fn test_no_requirements_accepts_minimal_request() {
        let raw = json!({"cfTriggers": [{}]});
        assert!(is_valid(&raw, &FieldRequirements::NONE));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = validate_request(&json!([1, 2]), &FieldRequirements::NONE).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[traced_test]
    #[test]
    fn test_unknown_top_level_field_rejected_and_logged() {
        let mut raw = stage_request();
        raw["lambdaRole"] = json!("admin");

        let err = validate_request(&raw, &FieldRequirements::NONE).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownField {
                field: "lambdaRole".to_string()
            }
        );
        assert!(logs_contain("validation.rejected"));
        assert!(logs_contain("lambdaRole"));
    }

    #[test]
    fn test_missing_top_level_field_rejected() {
        let mut raw = stage_request();
        raw.as_object_mut().unwrap().remove("lambdaCodeS3Bucket");

        let err = validate_request(&raw, &Operation::Stage.requirements()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "lambdaCodeS3Bucket".to_string()
            }
        );
    }

    #[test]
    fn test_present_keys_satisfy_requirements_whatever_their_value() {
        let mut raw = stage_request();
        raw["lambdaCodeS3Bucket"] = Value::Null;
        assert!(is_valid(&raw, &Operation::Stage.requirements()));
        assert!(is_valid(&raw, &Operation::Deploy.requirements()));

        raw["lambdaCodeS3Bucket"] = json!("");
        raw["cfTriggers"][0]["lambdaCodeS3Key"] = json!(false);
        assert!(is_valid(&raw, &Operation::Deploy.requirements()));

        raw.as_object_mut().unwrap().remove("lambdaCodeS3Bucket");
        assert!(!is_valid(&raw, &Operation::Deploy.requirements()));
    }

    #[test]
    fn test_empty_or_missing_triggers_rejected() {
        let mut raw = stage_request();
        raw["cfTriggers"] = json!([]);
        assert_eq!(
            validate_request(&raw, &FieldRequirements::NONE).unwrap_err(),
            ValidationError::NoTriggers
        );

        raw.as_object_mut().unwrap().remove("cfTriggers");
        assert_eq!(
            validate_request(&raw, &FieldRequirements::NONE).unwrap_err(),
            ValidationError::NoTriggers
        );

        raw["cfTriggers"] = json!("viewer-request");
        assert_eq!(
            validate_request(&raw, &FieldRequirements::NONE).unwrap_err(),
            ValidationError::NoTriggers
        );
    }

    #[test]
    fn test_trigger_must_be_object() {
        let raw = json!({"cfTriggers": [{"lambdaFunctionName": "a"}, "b"]});
        assert_eq!(
            validate_request(&raw, &FieldRequirements::NONE).unwrap_err(),
            ValidationError::TriggerNotAnObject { index: 1 }
        );
    }

    #[test]
    fn test_unknown_trigger_field_rejected() {
        let mut raw = stage_request();
        raw["cfTriggers"][0]["lambdaMemory"] = json!(128);

        let err = validate_request(&raw, &FieldRequirements::NONE).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownTriggerField {
                index: 0,
                field: "lambdaMemory".to_string()
            }
        );
    }

    #[test]
    fn test_missing_trigger_field_per_operation() {
        let mut raw = stage_request();
        raw["cfTriggers"][0]
            .as_object_mut()
            .unwrap()
            .remove("lambdaCodeFilePath");

        assert_eq!(
            validate_request(&raw, &Operation::Stage.requirements()).unwrap_err(),
            ValidationError::MissingTriggerField {
                index: 0,
                field: "lambdaCodeFilePath".to_string()
            }
        );
        // Deploy does not need the local artifact.
        assert!(is_valid(&raw, &Operation::Deploy.requirements()));
    }

    #[test]
    fn test_activate_requires_distribution_and_path() {
        let raw = json!({
            "cfDistributionID": "E123",
            "cfTriggers": [{"cfTriggerName": "viewer-request", "lambdaFunctionName": "edge-auth"}]
        });
        let err = validate_request(&raw, &Operation::Activate.requirements()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "cacheBehaviorPath".to_string()
            }
        );
    }

    #[test]
    fn test_custom_requirements() {
        let required = FieldRequirements {
            top_level: &["awsRegion", "lambdaCodeS3Bucket"],
            trigger: &["lambdaFunctionName"],
        };
        assert!(is_valid(&stage_request(), &required));

        let mut raw = stage_request();
        raw.as_object_mut().unwrap().remove("awsRegion");
        assert!(!is_valid(&raw, &required));
    }
}
