//! Issue code taxonomy (spec.md §4.1) and the `jsonschema` → `ValidationIssue`
//! mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable, caller-facing classification of a single validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    TooSmall,
    TooBig,
    InvalidStringFormat,
    InvalidStringLength,
    InvalidStringPattern,
    InvalidEnumValue,
    InvalidLiteral,
    UnrecognizedKeys,
    InvalidUnion,
    InvalidDate,
    Custom,
}

/// One reported violation, with its location in the params document
/// (spec.md §4.1: "field path, issue code, human message, observed value").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field_path: String,
    pub issue_code: IssueCode,
    pub message: String,
    pub observed_value: Option<Value>,
}

impl ValidationIssue {
    pub(super) fn from_jsonschema(err: jsonschema::ValidationError<'_>) -> Self {
        use jsonschema::error::ValidationErrorKind as K;

        let issue_code = match &err.kind {
            // A missing required property is reported the same way a
            // wrong-typed one is (spec.md scenario S1: `{field: "file_path",
            // issue: "invalid_type"}` for an absent required field) —
            // from the caller's point of view both mean "the value this
            // schema needed wasn't there."
            K::Type { .. } | K::Required { .. } => IssueCode::InvalidType,
            K::Minimum { .. } | K::ExclusiveMinimum { .. } | K::MinItems { .. } | K::MinProperties { .. } => {
                IssueCode::TooSmall
            }
            K::Maximum { .. } | K::ExclusiveMaximum { .. } | K::MaxItems { .. } | K::MaxProperties { .. } => {
                IssueCode::TooBig
            }
            K::MinLength { .. } => IssueCode::TooSmall,
            K::MaxLength { .. } => IssueCode::TooBig,
            K::Format { .. } => IssueCode::InvalidStringFormat,
            K::Pattern { .. } => IssueCode::InvalidStringPattern,
            K::Enum { .. } => IssueCode::InvalidEnumValue,
            K::Constant { .. } => IssueCode::InvalidLiteral,
            K::AdditionalProperties { .. } | K::UnevaluatedProperties { .. } => {
                IssueCode::UnrecognizedKeys
            }
            K::AnyOf | K::OneOfMultipleValid | K::OneOfNotValid => IssueCode::InvalidUnion,
            _ => IssueCode::Custom,
        };

        // `jsonschema` doesn't carry a dedicated date-format kind; surface it
        // via the `Format` arm's format name instead, since `date`/`date-time`
        // are the only formats this crate's tools put on date-like fields.
        let issue_code = if issue_code == IssueCode::InvalidStringFormat {
            if let K::Format { format } = &err.kind {
                if format == "date" || format == "date-time" {
                    IssueCode::InvalidDate
                } else {
                    issue_code
                }
            } else {
                issue_code
            }
        } else {
            issue_code
        };

        // `Required`'s instance_path points at the *containing* object (the
        // property itself doesn't exist to path into) — append its name so
        // `field_path` still names the missing field, not its parent.
        let field_path = match &err.kind {
            K::Required { property } => {
                let base = err.instance_path.to_string();
                let name = property.as_str().unwrap_or_default();
                if base.is_empty() {
                    format!("/{name}")
                } else {
                    format!("{base}/{name}")
                }
            }
            _ => err.instance_path.to_string(),
        };

        Self {
            field_path,
            message: err.to_string(),
            observed_value: Some(err.instance.into_owned()),
            issue_code,
        }
    }
}
