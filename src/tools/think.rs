//! Think tool: a no-op scratchpad the model calls to reason out loud
//! without taking any action.
//!
//! Grounded on `tools/builtins/create_task.rs::CreateTaskTool`'s
//! validate-only shape ("the actual work is handled elsewhere") — here
//! there is no elsewhere; the tool's only effect is to echo the thought
//! back so it appears in the transcript.

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct ThinkTool {
    definition: ToolDefinition,
}

impl Default for ThinkTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "Think",
            ToolKind::Think,
            json!({
                "type": "object",
                "properties": {
                    "thought": { "type": "string", "description": "Reasoning to record. Has no side effects." }
                },
                "required": ["thought"]
            }),
        )
        .with_description(
            "Think without acting",
            "Records a reasoning step with no side effects, useful for \
             working through a plan before calling a tool that does.",
        );
        Self { definition }
    }
}

#[async_trait]
impl Tool for ThinkTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        _context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let thought = params
            .get("thought")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "thought is required".into(),
                partial_output: None,
            })?;
        Ok(ToolResult::ok_with_display(thought, thought))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse};
    use std::sync::Arc;

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
    async fn echoes_the_thought_back() {
        let tool = ThinkTool::new();
        let ctx = ExecutionContext::new("s", "m", None, Arc::new(Always));
        let result = tool
            .execute(json!({"thought": "try the simpler approach first"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.llm_content, "try the simpler approach first");
    }
}
