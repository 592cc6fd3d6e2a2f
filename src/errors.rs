//! Crate-wide error taxonomy (spec.md §7).
//!
//! Every pipeline stage converts its local error type into a `ToolCoreError`
//! before it leaves the stage; the pipeline never returns an untyped error
//! to its caller.

use crate::hooks::HookError;
use crate::permissions::PermissionError;
use crate::protocol::TransportError;
use crate::schema::ValidationError;
use crate::snapshot::SnapshotError;
use crate::subprocess::SubprocessError;
use thiserror::Error;

/// Stage a timeout occurred in, for `ToolCoreError::Timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validation,
    Permission,
    PreHook,
    Snapshot,
    Execute,
    PostHook,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Permission => "permission",
            Stage::PreHook => "pre_hook",
            Stage::Snapshot => "snapshot",
            Stage::Execute => "execute",
            Stage::PostHook => "post_hook",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ToolCoreError {
    #[error("validation failed")]
    ValidationError(#[from] ValidationError),

    #[error("tool '{0}' is not registered")]
    ToolNotFound(String),

    #[error("denied by policy: matched rule `{matched}`")]
    DeniedByPolicy { matched: String },

    #[error("denied by user{}", feedback.as_deref().map(|f| format!(": {f}")).unwrap_or_default())]
    DeniedByUser { feedback: Option<String> },

    #[error("denied by hook: {reason}")]
    DeniedByHook { reason: String },

    #[error("cancelled")]
    Cancelled,

    #[error("stage `{stage}` timed out after {elapsed_ms}ms")]
    Timeout { stage: Stage, elapsed_ms: u64 },

    #[error("execution error: {message}")]
    ExecutionError {
        message: String,
        partial_output: Option<String>,
    },

    #[error("concurrency limit reached ({resource}): {hint}")]
    ConcurrentLimitError { resource: String, hint: String },

    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("internal invariant violated: {0}")]
    InternalError(String),
}

impl From<PermissionError> for ToolCoreError {
    fn from(e: PermissionError) -> Self {
        match e {
            PermissionError::Denied { matched } => ToolCoreError::DeniedByPolicy { matched },
            PermissionError::DeniedByUser { feedback } => {
                ToolCoreError::DeniedByUser { feedback }
            }
            PermissionError::Cancelled => ToolCoreError::Cancelled,
            PermissionError::Other(message) => ToolCoreError::InternalError(message),
        }
    }
}

impl From<HookError> for ToolCoreError {
    fn from(e: HookError) -> Self {
        match e {
            HookError::Denied { reason } => ToolCoreError::DeniedByHook { reason },
            HookError::Timeout { elapsed_ms } => ToolCoreError::Timeout {
                stage: Stage::PreHook,
                elapsed_ms,
            },
            HookError::Spawn(message) => ToolCoreError::ExecutionError {
                message,
                partial_output: None,
            },
        }
    }
}

impl From<SnapshotError> for ToolCoreError {
    fn from(e: SnapshotError) -> Self {
        ToolCoreError::ExecutionError {
            message: e.to_string(),
            partial_output: None,
        }
    }
}

impl From<SubprocessError> for ToolCoreError {
    fn from(e: SubprocessError) -> Self {
        match e {
            SubprocessError::ConcurrentLimit { hint } => ToolCoreError::ConcurrentLimitError {
                resource: "subprocess".into(),
                hint,
            },
            SubprocessError::Cancelled => ToolCoreError::Cancelled,
            other => ToolCoreError::ExecutionError {
                message: other.to_string(),
                partial_output: None,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolCoreError>;
