//! `ToolResult`: the caller-facing output of an invocation (spec.md §6, §7).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Taxonomy tag carried on a failed `ToolResult` (spec.md §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub code: Option<String>,
    pub details: Option<Value>,
}

/// The execute contract's output (spec.md §6 "Tool `execute` contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Form presented back to the language model.
    pub llm_content: String,
    /// Form presented to the user.
    pub display_content: String,
    pub metadata: Option<Value>,
    pub error: Option<ResultError>,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            success: true,
            llm_content: content.clone(),
            display_content: content,
            metadata: None,
            error: None,
        }
    }

    pub fn ok_with_display(llm_content: impl Into<String>, display_content: impl Into<String>) -> Self {
        Self {
            success: true,
            llm_content: llm_content.into(),
            display_content: display_content.into(),
            metadata: None,
            error: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn err(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            llm_content: message.clone(),
            display_content: message.clone(),
            metadata: None,
            error: Some(ResultError {
                error_type: error_type.into(),
                message,
                code: None,
                details: None,
            }),
        }
    }

    pub fn from_core_error(err: &crate::errors::ToolCoreError) -> Self {
        let error_type = match err {
            crate::errors::ToolCoreError::ValidationError(_) => "ValidationError",
            crate::errors::ToolCoreError::ToolNotFound(_) => "ToolNotFound",
            crate::errors::ToolCoreError::DeniedByPolicy { .. } => "DeniedByPolicy",
            crate::errors::ToolCoreError::DeniedByUser { .. } => "DeniedByUser",
            crate::errors::ToolCoreError::DeniedByHook { .. } => "DeniedByHook",
            crate::errors::ToolCoreError::Cancelled => "Cancelled",
            crate::errors::ToolCoreError::Timeout { .. } => "Timeout",
            crate::errors::ToolCoreError::ExecutionError { .. } => "ExecutionError",
            crate::errors::ToolCoreError::ConcurrentLimitError { .. } => "ConcurrentLimitError",
            crate::errors::ToolCoreError::TransportError(_) => "TransportError",
            crate::errors::ToolCoreError::InternalError(_) => "InternalError",
        };
        let mut result = Self::err(error_type, err.to_string());
        if let Some(e) = result.error.as_mut() {
            e.details = core_error_details(err);
        }
        result
    }
}

fn core_error_details(err: &crate::errors::ToolCoreError) -> Option<Value> {
    use crate::errors::ToolCoreError::*;
    match err {
        DeniedByPolicy { matched } => Some(serde_json::json!({ "matched": matched })),
        DeniedByUser { feedback } => feedback
            .as_ref()
            .map(|f| serde_json::json!({ "feedback": f })),
        Timeout { stage, elapsed_ms } => Some(serde_json::json!({
            "stage": stage.to_string(),
            "elapsed_ms": elapsed_ms,
        })),
        ExecutionError { partial_output, .. } => partial_output
            .as_ref()
            .map(|p| serde_json::json!({ "partial_output": p })),
        ConcurrentLimitError { resource, hint } => {
            Some(serde_json::json!({ "resource": resource, "hint": hint }))
        }
        _ => None,
    }
}
