//! Task tool: delegates a goal to a nested agent loop via the Subagent
//! Scheduler (C10).
//!
//! Grounded on `tools/builtins/delegate.rs::DelegateTool`'s validate-then-hand-
//! off shape, rewired to call directly into `subagent::SubagentScheduler`
//! rather than the teacher's kameo-actor `DelegationOrchestrator`/event bus —
//! this crate already owns that scheduling primitive (C10).

use crate::errors::ToolCoreError;
use crate::subagent::SubagentScheduler;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct TaskTool {
    definition: ToolDefinition,
    scheduler: Arc<SubagentScheduler>,
}

impl TaskTool {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        let definition = ToolDefinition::new(
            "Task",
            ToolKind::Execute,
            json!({
                "type": "object",
                "properties": {
                    "description": { "type": "string", "description": "Short summary of what the subagent should accomplish." },
                    "prompt": { "type": "string", "description": "Full goal/instructions handed to the subagent." },
                    "background": {
                        "type": "boolean",
                        "default": false,
                        "description": "Run the subagent detached; poll its result with TaskOutput."
                    }
                },
                "required": ["description", "prompt"]
            }),
        )
        .with_description(
            "Delegate a goal to a subagent",
            "Runs a nested agent loop against a goal, either inline (blocking \
             until it finishes or the concurrency cap is hit) or in the \
             background, returning a task id to poll with TaskOutput.",
        );
        Self { definition, scheduler }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "prompt is required".into(),
                partial_output: None,
            })?
            .to_string();
        let background = params.get("background").and_then(Value::as_bool).unwrap_or(false);

        if background {
            let id = self.scheduler.spawn_background(prompt, context.clone()).await?;
            return Ok(ToolResult::ok(format!("started background task {id}"))
                .with_metadata(json!({ "task_id": id, "background": true })));
        }

        self.scheduler.run_synchronous(prompt, context.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse};
    use std::time::Duration;
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
    async fn synchronous_task_runs_inline() {
        let dir = tempdir().unwrap();
        let scheduler = Arc::new(SubagentScheduler::new(Arc::new(EchoRunner), dir.path().to_path_buf(), 5).await);
        let tool = TaskTool::new(scheduler);
        let result = tool
            .execute(json!({"description": "d", "prompt": "build the thing"}), &context())
            .await
            .unwrap();
        assert_eq!(result.llm_content, "did: build the thing");
    }

    #[tokio::test]
    async fn background_task_returns_pollable_id() {
        let dir = tempdir().unwrap();
        let scheduler = Arc::new(SubagentScheduler::new(Arc::new(EchoRunner), dir.path().to_path_buf(), 5).await);
        let tool = TaskTool::new(scheduler.clone());
        let result = tool
            .execute(json!({"description": "d", "prompt": "go", "background": true}), &context())
            .await
            .unwrap();
        let id = result.metadata.unwrap()["task_id"].as_str().unwrap().to_string();
        let record = scheduler.wait_for_completion(&id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(record.status, crate::subagent::TaskStatus::Completed);
    }
}
