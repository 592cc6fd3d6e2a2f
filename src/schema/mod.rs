//! Schema Validator (C1, spec.md §4.1).
//!
//! Validates tool call arguments against a tool's JSON Schema before any
//! permission or execution logic runs. Grounded on the `jsonschema` crate
//! (enriched from `oxicrab-oxicrab`'s dependency stack: `querymt-agent`
//! carries `schemars` to *emit* schemas but never validates against one at
//! runtime).

mod issues;

pub use issues::{IssueCode, ValidationIssue};

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{} issue(s) validating parameters", .issues.len())]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

/// Compiles a tool's `parameter_schema` once at registration time and
/// validates call arguments against it on every invocation.
pub struct SchemaValidator {
    compiled: Validator,
}

impl SchemaValidator {
    pub fn compile(schema: &Value) -> Result<Self, ValidationError> {
        let compiled = jsonschema::validator_for(schema).map_err(|e| ValidationError {
            issues: vec![ValidationIssue {
                field_path: e.instance_path.to_string(),
                issue_code: IssueCode::Custom,
                message: e.to_string(),
                observed_value: None,
            }],
        })?;
        Ok(Self { compiled })
    }

    /// Validate `params`, returning every issue found (spec.md §4.1: "reports
    /// every violation it finds, not just the first").
    pub fn validate(&self, params: &Value) -> Result<(), ValidationError> {
        let issues: Vec<ValidationIssue> = self
            .compiled
            .iter_errors(params)
            .map(ValidationIssue::from_jsonschema)
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "minLength": 1},
                "limit": {"type": "integer", "minimum": 0, "maximum": 1000},
                "mode": {"enum": ["read", "write"]}
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    #[test]
    fn valid_params_pass() {
        let v = SchemaValidator::compile(&schema()).unwrap();
        assert!(v.validate(&json!({"file_path": "a.txt"})).is_ok());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let v = SchemaValidator::compile(&schema()).unwrap();
        let err = v.validate(&json!({})).unwrap_err();
        assert!(!err.issues.is_empty());
    }

    #[test]
    fn missing_required_field_maps_to_invalid_type() {
        // spec.md scenario S1: a missing required field is reported with
        // `issue: "invalid_type"`, field_path naming the missing field.
        let v = SchemaValidator::compile(&schema()).unwrap();
        let err = v.validate(&json!({})).unwrap_err();
        let issue = err
            .issues
            .iter()
            .find(|i| i.field_path.ends_with("file_path"))
            .expect("a reported issue for the missing file_path field");
        assert_eq!(issue.issue_code, IssueCode::InvalidType);
    }

    #[test]
    fn reports_every_violation_not_just_first() {
        let v = SchemaValidator::compile(&schema()).unwrap();
        let err = v
            .validate(&json!({"limit": 5000, "mode": "delete", "unknown": true}))
            .unwrap_err();
        // missing file_path + limit too big + bad enum + unrecognized key
        assert!(err.issues.len() >= 3);
    }

    #[test]
    fn too_big_maps_to_integer_bound() {
        let v = SchemaValidator::compile(&schema()).unwrap();
        let err = v
            .validate(&json!({"file_path": "a.txt", "limit": 5000}))
            .unwrap_err();
        assert!(err.issues.iter().any(|i| i.issue_code == IssueCode::TooBig));
    }

    #[test]
    fn bad_enum_value_is_reported() {
        let v = SchemaValidator::compile(&schema()).unwrap();
        let err = v
            .validate(&json!({"file_path": "a.txt", "mode": "delete"}))
            .unwrap_err();
        assert!(err
            .issues
            .iter()
            .any(|i| i.issue_code == IssueCode::InvalidEnumValue));
    }
}
