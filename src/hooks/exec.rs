//! Command hook execution (spec.md §4.3 "For command hooks...").
//!
//! Spawns the hook command with the hook input JSON on stdin, races its
//! wait against the pipeline's cancellation token, and applies a timeout on
//! top of that race — the same cancellable-subprocess shape as
//! `tools/builtins/shell.rs::ShellTool::call` in the teacher.

use super::config::{Hook, TimeoutBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Fixed JSON shape on stdin (spec.md §3 "Hook Input/Output").
#[derive(Debug, Clone, Serialize)]
pub struct HookInput {
    // re-derived Clone so the engine can stamp each hook's tool_input/tool_response
    pub event: String,
    pub execution_id: String,
    pub timestamp: String,
    pub project_dir: Option<String>,
    pub session_id: String,
    pub permission_mode: String,
    pub tool_name: Option<String>,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
}

/// Parsed pre-hook output fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreHookOutput {
    pub decision: Option<String>,
    pub reason: Option<String>,
    #[serde(rename = "modifiedInput")]
    pub modified_input: Option<Value>,
    #[serde(rename = "systemMessage")]
    pub system_message: Option<String>,
    #[serde(rename = "suppressOutput")]
    pub suppress_output: Option<bool>,
}

/// Parsed post-hook output fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostHookOutput {
    #[serde(rename = "additionalContext")]
    pub additional_context: Option<String>,
    #[serde(rename = "modifiedOutput")]
    pub modified_output: Option<Value>,
    #[serde(rename = "systemMessage")]
    pub system_message: Option<String>,
    #[serde(rename = "suppressOutput")]
    pub suppress_output: Option<bool>,
}

/// Outcome of running one hook, before aggregation across the matcher list.
pub enum HookRunOutcome {
    /// Exit 0, parsed as JSON (pre- or post-hook, caller decides which).
    Parsed(Value),
    /// Exit 0 with non-JSON stdout — a benign notice.
    Notice,
    /// Non-zero, non-124, non-2: non-blocking error, continue.
    NonBlockingError(String),
    /// Exit 2: blocking error.
    BlockingError(String),
    /// Exit 124: timeout, apply `timeout_behavior`.
    Timeout(TimeoutBehavior),
}

#[derive(Debug, thiserror::Error)]
pub enum HookExecError {
    #[error("failed to spawn hook command: {0}")]
    Spawn(String),
    #[error("cancelled")]
    Cancelled,
}

pub async fn run_command_hook(
    command: &str,
    configured_timeout: Duration,
    timeout_behavior: TimeoutBehavior,
    input: &HookInput,
    cancellation: &CancellationToken,
) -> Result<HookRunOutcome, HookExecError> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-lc", command]);
        c
    };
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| HookExecError::Spawn(e.to_string()))?;

    let stdin_payload =
        serde_json::to_vec(input).map_err(|e| HookExecError::Spawn(e.to_string()))?;
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(&stdin_payload).await;
    }

    let wait_handle = tokio::spawn(async move {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let (_, _) = tokio::join!(
            async {
                if let Some(ref mut s) = stdout {
                    let _ = s.read_to_end(&mut stdout_buf).await;
                }
            },
            async {
                if let Some(ref mut s) = stderr {
                    let _ = s.read_to_end(&mut stderr_buf).await;
                }
            },
        );
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stdout_buf, stderr_buf))
    });

    tokio::pin!(wait_handle);

    let raced = tokio::select! {
        biased;
        _ = cancellation.cancelled() => {
            wait_handle.abort();
            return Err(HookExecError::Cancelled);
        }
        result = tokio::time::timeout(configured_timeout, &mut wait_handle) => result,
    };

    let (status, stdout_buf, stderr_buf) = match raced {
        Ok(join_result) => join_result
            .map_err(|e| HookExecError::Spawn(format!("task join failed: {e}")))?
            .map_err(|e| HookExecError::Spawn(format!("hook command failed: {e}")))?,
        Err(_elapsed) => return Ok(HookRunOutcome::Timeout(timeout_behavior)),
    };

    let exit_code = status.code().unwrap_or(-1);
    let stdout_str = String::from_utf8_lossy(&stdout_buf).into_owned();
    let stderr_str = String::from_utf8_lossy(&stderr_buf).into_owned();

    Ok(match exit_code {
        0 => match serde_json::from_str::<Value>(&stdout_str) {
            Ok(v) => HookRunOutcome::Parsed(v),
            Err(_) => HookRunOutcome::Notice,
        },
        // Exit 2 blocks the tool call; the hook's stderr carries the reason
        // (spec.md §8 P9), not stdout.
        2 => HookRunOutcome::BlockingError(stderr_str),
        124 => HookRunOutcome::Timeout(timeout_behavior),
        _ => HookRunOutcome::NonBlockingError(stdout_str),
    })
}

pub fn timeout_for(hook: &Hook) -> (Duration, TimeoutBehavior) {
    match hook {
        Hook::Command {
            timeout_secs,
            timeout_behavior,
            ..
        } => (Duration::from_secs(*timeout_secs), *timeout_behavior),
        Hook::Prompt { timeout_secs, .. } => {
            (Duration::from_secs(*timeout_secs), TimeoutBehavior::Ask)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> HookInput {
        HookInput {
            event: "PreToolUse".into(),
            execution_id: "exec-1".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            project_dir: None,
            session_id: "sess-1".into(),
            permission_mode: "default".into(),
            tool_name: Some("Bash".into()),
            tool_use_id: Some("tu-1".into()),
            tool_input: None,
            tool_response: None,
        }
    }

    #[tokio::test]
    async fn exit_two_reports_stderr_not_stdout() {
        let outcome = run_command_hook(
            "echo on-stdout; echo on-stderr >&2; exit 2",
            Duration::from_secs(5),
            TimeoutBehavior::Deny,
            &input(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        match outcome {
            HookRunOutcome::BlockingError(reason) => {
                assert!(reason.contains("on-stderr"));
                assert!(!reason.contains("on-stdout"));
            }
            _ => panic!("expected BlockingError"),
        }
    }
}
