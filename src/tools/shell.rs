//! Shell tool: runs a command in the session's persistent shell (C6,
//! `subprocess::ShellSession`).
//!
//! Grounded on `tools/builtins/shell.rs::ShellTool`'s cancellable-wait shape,
//! adapted to the crate's own reusable, timeout-bounded `ShellSession::run`
//! rather than a fresh `tokio::process::Command` per call.

use crate::errors::ToolCoreError;
use crate::subprocess::SubprocessManager;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Id prefix for a backgrounded `Bash` invocation (spec.md §3 "Background
/// Process Handle": "id prefixed `bash_…` or `agent_…`"). Distinguishes a
/// background shell process from a subagent task id in `TaskOutputTool`.
const BACKGROUND_ID_PREFIX: &str = "bash";

pub struct ShellTool {
    definition: ToolDefinition,
    subprocess: Arc<SubprocessManager>,
}

impl ShellTool {
    pub fn new(subprocess: Arc<SubprocessManager>) -> Self {
        let definition = ToolDefinition::new(
            "Bash",
            ToolKind::Execute,
            json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command to run in the session's shell." },
                    "timeout_secs": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Seconds to wait before returning partial output.",
                        "default": DEFAULT_TIMEOUT_SECS
                    },
                    "run_in_background": {
                        "type": "boolean",
                        "description": "Detach the command into a background process polled via TaskOutput instead of waiting for it here.",
                        "default": false
                    }
                },
                "required": ["command"]
            }),
        )
        .with_description(
            "Run a shell command",
            "Runs a command in the session's persistent shell and returns its \
             output, or the output collected so far if the timeout elapses first.",
        );
        Self { definition, subprocess }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "command is required".into(),
                partial_output: None,
            })?;
        let timeout_secs = params
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let run_in_background = params
            .get("run_in_background")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if run_in_background {
            return self.spawn_background(command, context);
        }

        let session = self
            .subprocess
            .session(&context.session_id, context.workspace_root.as_deref())?;
        let output = session
            .run(command, Duration::from_secs(timeout_secs), &context.cancellation)
            .await?;

        let mut display = output.stdout.clone();
        if output.timed_out {
            display.push_str(&format!(
                "\n[command still running after {timeout_secs}s; output so far shown above]"
            ));
        }

        Ok(ToolResult::ok(display).with_metadata(json!({
            "timed_out": output.timed_out,
        })))
    }
}

impl ShellTool {
    /// Detaches `command` as a background process (spec.md scenario S5)
    /// instead of waiting for it inline. Returns immediately; the caller
    /// polls the returned `session_id` via `TaskOutputTool`.
    fn spawn_background(
        &self,
        command: &str,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let started_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();

        let handle = self.subprocess.background.spawn(
            BACKGROUND_ID_PREFIX,
            "sh",
            &["-c".to_string(), command.to_string()],
            context.workspace_root.as_deref(),
            &[],
            started_at,
        )?;

        Ok(ToolResult::ok(format!("started in background as {}", handle.id)).with_metadata(json!({
            "session_id": handle.id,
            "background": true,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse};
    use tempfile::tempdir;

    struct Always;

    #[async_trait]
    impl ConfirmationChannel for Always {
        async fn confirm(&self, _req: ConfirmationRequest) -> ConfirmationResponse {
            ConfirmationResponse {
                approved: true,
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SubprocessManager::new(4));
        let tool = ShellTool::new(manager);
        let ctx = ExecutionContext::new("s1", "m1", Some(dir.path().to_path_buf()), Arc::new(Always));

        let result = tool.execute(json!({"command": "echo hi"}), &ctx).await.unwrap();
        assert!(result.llm_content.contains("hi"));
    }

    #[tokio::test]
    async fn run_in_background_returns_a_pollable_session_id() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SubprocessManager::new(4));
        let tool = ShellTool::new(manager);
        let ctx = ExecutionContext::new("s1", "m1", Some(dir.path().to_path_buf()), Arc::new(Always));

        let result = tool
            .execute(json!({"command": "echo hi", "run_in_background": true}), &ctx)
            .await
            .unwrap();
        let session_id = result.metadata.as_ref().unwrap()["session_id"].as_str().unwrap();
        assert!(session_id.starts_with("bash_"));
        assert_eq!(result.metadata.as_ref().unwrap()["background"], true);
    }

    #[tokio::test]
    async fn reuses_the_same_session_across_calls() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SubprocessManager::new(4));
        let tool = ShellTool::new(manager);
        let ctx = ExecutionContext::new("s1", "m1", Some(dir.path().to_path_buf()), Arc::new(Always));

        tool.execute(json!({"command": "export FOO=bar"}), &ctx).await.unwrap();
        let result = tool.execute(json!({"command": "echo $FOO"}), &ctx).await.unwrap();
        assert!(result.llm_content.contains("bar"));
    }
}
