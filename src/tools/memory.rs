//! Memory tool: per-session scratch key/value store for notes the model
//! wants to carry across turns within a conversation.
//!
//! Grounded on `tools/builtins/todo.rs`'s shape (a process-wide store keyed
//! by session id), rebuilt on `moka::sync::Cache` rather than a
//! `once_cell::Lazy<Mutex<HashMap>>` static — this crate already declares
//! `moka` for exactly this kind of bounded, TTL-evicting cache.

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use moka::sync::Cache;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_MAX_ENTRIES: u64 = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

fn cache_key(session_id: &str, key: &str) -> String {
    format!("{session_id}:{key}")
}

pub struct MemoryTool {
    definition: ToolDefinition,
    store: Cache<String, String>,
}

impl Default for MemoryTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "Memory",
            ToolKind::Memory,
            json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["set", "get", "delete", "list"] },
                    "key": { "type": "string" },
                    "value": { "type": "string" }
                },
                "required": ["action"]
            }),
        )
        .with_description(
            "Remember a note for this session",
            "Stores or retrieves short notes scoped to the current session, \
             so the model can carry small facts across turns without \
             re-deriving them.",
        );
        let store = Cache::builder()
            .max_capacity(DEFAULT_MAX_ENTRIES)
            .time_to_idle(DEFAULT_TTL)
            .build();
        Self { definition, store }
    }
}

#[async_trait]
impl Tool for MemoryTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let action = params
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "action is required".into(),
                partial_output: None,
            })?;

        match action {
            "set" => {
                let key = required_key(&params)?;
                let value = params
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolCoreError::ExecutionError {
                        message: "value is required for action=set".into(),
                        partial_output: None,
                    })?;
                self.store
                    .insert(cache_key(&context.session_id, key), value.to_string());
                Ok(ToolResult::ok(format!("remembered `{key}`")))
            }
            "get" => {
                let key = required_key(&params)?;
                match self.store.get(&cache_key(&context.session_id, key)) {
                    Some(value) => Ok(ToolResult::ok(value)),
                    None => Ok(ToolResult::err("NotFound", format!("no memory stored under `{key}`"))),
                }
            }
            "delete" => {
                let key = required_key(&params)?;
                self.store.invalidate(&cache_key(&context.session_id, key));
                Ok(ToolResult::ok(format!("forgot `{key}`")))
            }
            "list" => {
                let prefix = format!("{}:", context.session_id);
                let keys: Vec<String> = self
                    .store
                    .iter()
                    .filter_map(|(k, _)| k.strip_prefix(&prefix).map(str::to_string))
                    .collect();
                if keys.is_empty() {
                    Ok(ToolResult::ok("(no memories stored)"))
                } else {
                    Ok(ToolResult::ok(keys.join("\n")))
                }
            }
            other => Ok(ToolResult::err(
                "InvalidParams",
                format!("unknown action `{other}`; expected set, get, delete, or list"),
            )),
        }
    }
}

fn required_key(params: &Value) -> Result<&str, ToolCoreError> {
    params
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolCoreError::ExecutionError {
            message: "key is required for this action".into(),
            partial_output: None,
        })
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

    fn context(session_id: &str) -> ExecutionContext {
        ExecutionContext::new(session_id, "m", None, Arc::new(Always))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let tool = MemoryTool::new();
        tool.execute(json!({"action": "set", "key": "plan", "value": "refactor auth"}), &context("s1"))
            .await
            .unwrap();
        let result = tool.execute(json!({"action": "get", "key": "plan"}), &context("s1")).await.unwrap();
        assert_eq!(result.llm_content, "refactor auth");
    }

    #[tokio::test]
    async fn memory_is_scoped_per_session() {
        let tool = MemoryTool::new();
        tool.execute(json!({"action": "set", "key": "plan", "value": "a"}), &context("s1")).await.unwrap();
        let result = tool.execute(json!({"action": "get", "key": "plan"}), &context("s2")).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let tool = MemoryTool::new();
        tool.execute(json!({"action": "set", "key": "k", "value": "v"}), &context("s1")).await.unwrap();
        tool.execute(json!({"action": "delete", "key": "k"}), &context("s1")).await.unwrap();
        let result = tool.execute(json!({"action": "get", "key": "k"}), &context("s1")).await.unwrap();
        assert!(!result.success);
    }
}
