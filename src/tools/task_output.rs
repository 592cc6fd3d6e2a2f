//! TaskOutput tool: polls a background `Task` subagent or a backgrounded
//! `Bash` process for its current output/status.
//!
//! Grounded on `subagent::SubagentScheduler::wait_for_completion` (C10) and
//! `subprocess::BackgroundProcessManager::consume_output` (C6) — unified
//! behind one tool because both expose the same "pollable handle, id
//! namespaced by a type prefix" shape spec.md §4.9 and §4.5 both describe.

use crate::errors::ToolCoreError;
use crate::subagent::SubagentScheduler;
use crate::subprocess::BackgroundProcessManager;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POLL_SECS: u64 = 30;

pub struct TaskOutputTool {
    definition: ToolDefinition,
    scheduler: Arc<SubagentScheduler>,
    background: Arc<BackgroundProcessManager>,
}

impl TaskOutputTool {
    pub fn new(scheduler: Arc<SubagentScheduler>, background: Arc<BackgroundProcessManager>) -> Self {
        let definition = ToolDefinition::new(
            "TaskOutput",
            ToolKind::ReadOnly,
            json!({
                "type": "object",
                "properties": {
                    "task_id": { "type": "string", "description": "Id returned by Task(background=true) or a backgrounded Bash command." },
                    "timeout_secs": {
                        "type": "integer",
                        "minimum": 0,
                        "default": DEFAULT_POLL_SECS,
                        "description": "How long to wait for new output before returning what's available."
                    }
                },
                "required": ["task_id"]
            }),
        )
        .with_description(
            "Check on a background task",
            "Polls a background subagent or shell process for its current \
             status and any output produced since the last check.",
        );
        Self { definition, scheduler, background }
    }
}

#[async_trait]
impl Tool for TaskOutputTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        _context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let task_id = params
            .get("task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "task_id is required".into(),
                partial_output: None,
            })?;
        let timeout_secs = params
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_POLL_SECS);

        if task_id.starts_with("agent_") {
            let record = self
                .scheduler
                .wait_for_completion(task_id, Duration::from_secs(timeout_secs))
                .await?;
            let body = serde_json::to_string_pretty(&record).map_err(|e| ToolCoreError::ExecutionError {
                message: e.to_string(),
                partial_output: None,
            })?;
            return Ok(ToolResult::ok(body).with_metadata(json!({ "status": record.status })));
        }

        let Some(handle) = self.background.get(task_id) else {
            return Ok(ToolResult::err(
                "NotFound",
                format!("no background task or process `{task_id}`"),
            ));
        };
        let output = handle
            .consume_output(timeout_secs > 0, Some(Duration::from_secs(timeout_secs)))
            .await;

        let mut body = String::new();
        if !output.stdout_delta.is_empty() {
            body.push_str(&String::from_utf8_lossy(&output.stdout_delta));
        }
        if !output.stderr_delta.is_empty() {
            body.push_str("\n[stderr]\n");
            body.push_str(&String::from_utf8_lossy(&output.stderr_delta));
        }
        if output.truncated {
            body.push_str("\n[output truncated]");
        }

        Ok(ToolResult::ok(body).with_metadata(json!({
            "status": output.status,
            "exit_code": output.exit_code,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse};

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

    struct EchoRunner;

    #[async_trait]
    impl crate::subagent::AgentLoopRunner for EchoRunner {
        async fn run(&self, goal: String, _context: ExecutionContext) -> Result<ToolResult, ToolCoreError> {
            Ok(ToolResult::ok(format!("did: {goal}")))
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("s", "m", None, Arc::new(Always))
    }

    #[tokio::test]
    async fn polls_a_backgrounded_shell_process() {
        let background = Arc::new(BackgroundProcessManager::new(16));
        let scheduler = Arc::new(
            SubagentScheduler::new(
                Arc::new(EchoRunner),
                tempfile::tempdir().unwrap().path().to_path_buf(),
                5,
            )
            .await,
        );
        let handle = background
            .spawn("bash", "sh", &["-c".into(), "echo hi".into()], None, &[], "t0")
            .unwrap();

        let tool = TaskOutputTool::new(scheduler, background);
        let result = tool
            .execute(json!({"task_id": handle.id, "timeout_secs": 5}), &context())
            .await
            .unwrap();
        assert!(result.llm_content.contains("hi"));
    }

    #[tokio::test]
    async fn polls_a_background_subagent_task() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Arc::new(SubagentScheduler::new(Arc::new(EchoRunner), dir.path().to_path_buf(), 5).await);
        let background = Arc::new(BackgroundProcessManager::new(16));
        let id = scheduler.spawn_background("goal".into(), context()).await.unwrap();

        let tool = TaskOutputTool::new(scheduler, background);
        let result = tool
            .execute(json!({"task_id": id, "timeout_secs": 5}), &context())
            .await
            .unwrap();
        assert!(result.llm_content.contains("completed"));
    }
}
