//! Execution context supplied by the caller (spec.md §3, §6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Permission mode in effect for the current turn (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AutoEdit,
    Yolo,
    Plan,
}

/// Scope at which a user's confirmation decision should be remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantScope {
    Once,
    Session,
}

/// The kind of confirmation being requested (spec.md §6 confirmation callback contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmationKind {
    Permission,
    EnterPlanMode,
    ExitPlanMode,
    AskUserQuestion,
    MaxTurnsExceeded,
}

/// Details describing a pending confirmation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    #[serde(rename = "type")]
    pub kind: ConfirmationKind,
    pub tool_name: Option<String>,
    pub args: Option<serde_json::Value>,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
    pub risks: Vec<String>,
    pub affected_files: Vec<PathBuf>,
    pub plan_content: Option<String>,
    pub questions: Vec<String>,
}

impl ConfirmationRequest {
    pub fn permission(tool_name: &str, args: &serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            kind: ConfirmationKind::Permission,
            tool_name: Some(tool_name.to_string()),
            args: Some(args.clone()),
            title: format!("Allow {tool_name}?"),
            message: message.into(),
            details: None,
            risks: Vec::new(),
            affected_files: Vec::new(),
            plan_content: None,
            questions: Vec::new(),
        }
    }
}

/// The user's answer to a confirmation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub approved: bool,
    pub reason: Option<String>,
    pub scope: Option<GrantScope>,
    pub target_mode: Option<PermissionMode>,
    pub feedback: Option<String>,
    pub answers: HashMap<String, Vec<String>>,
}

/// External confirmation callback: C3's only suspension point (spec.md §5).
#[async_trait]
pub trait ConfirmationChannel: Send + Sync {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResponse;
}

/// Streams free-form progress strings back to the caller while a tool runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn progress(&self, invocation_id: &str, chunk: String);
}

/// A `ProgressSink` that discards everything, for tests and headless runs.
pub struct NullProgressSink;

#[async_trait]
impl ProgressSink for NullProgressSink {
    async fn progress(&self, _invocation_id: &str, _chunk: String) {}
}

/// Execution context supplied by the caller for one invocation (spec.md §3).
#[derive(Clone)]
pub struct ExecutionContext {
    pub session_id: Arc<str>,
    pub message_id: Arc<str>,
    pub workspace_root: Option<PathBuf>,
    pub cancellation: CancellationToken,
    pub progress: Arc<dyn ProgressSink>,
    pub confirmation: Arc<dyn ConfirmationChannel>,
    pub permission_mode: PermissionMode,
}

impl ExecutionContext {
    pub fn new(
        session_id: impl Into<Arc<str>>,
        message_id: impl Into<Arc<str>>,
        workspace_root: Option<PathBuf>,
        confirmation: Arc<dyn ConfirmationChannel>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: message_id.into(),
            workspace_root,
            cancellation: CancellationToken::new(),
            progress: Arc::new(NullProgressSink),
            confirmation,
            permission_mode: PermissionMode::Default,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// Resolve a (possibly relative) path against the workspace root.
    /// Tools never read ambient process state (`process.cwd()`) — see
    /// DESIGN NOTES (REDESIGN FLAGS) in SPEC_FULL.md.
    pub fn resolve_path(&self, path: &str) -> crate::errors::Result<PathBuf> {
        let p = Path::new(path);
        if p.is_absolute() {
            return Ok(p.to_path_buf());
        }
        self.workspace_root
            .as_ref()
            .map(|root| root.join(p))
            .ok_or_else(|| {
                crate::errors::ToolCoreError::ExecutionError {
                    message: "cannot resolve relative path: no workspace root set".into(),
                    partial_output: None,
                }
            })
    }

    pub fn is_read_only(&self) -> bool {
        self.permission_mode == PermissionMode::Plan
    }
}
