//! Write tool: create or overwrite a file.
//!
//! Grounded on `tools/builtins/write_file.rs::WriteFileTool`, including its
//! belt-and-suspenders read-only check (SPEC_FULL.md §3 "Read-only session
//! mode") ahead of whatever the Permission Engine itself decides.

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

pub struct WriteTool {
    definition: ToolDefinition,
}

impl Default for WriteTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "Write",
            ToolKind::Write,
            json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "File path to write." },
                    "content": { "type": "string", "description": "Content to write." },
                    "create_dirs": {
                        "type": "boolean",
                        "description": "Create parent directories if missing.",
                        "default": true
                    }
                },
                "required": ["file_path", "content"]
            }),
        )
        .with_description(
            "Write a file",
            "Writes content to a file, creating parent directories if needed.",
        );
        Self { definition }
    }

    fn resolve(&self, params: &Value, context: &ExecutionContext) -> Result<PathBuf, ToolCoreError> {
        let path_arg = params
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "file_path is required".into(),
                partial_output: None,
            })?;
        context.resolve_path(path_arg)
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        if context.is_read_only() {
            return Ok(ToolResult::err(
                "PermissionDenied",
                "session is in read-only mode — file writes are not allowed",
            ));
        }

        let content = params
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "content is required".into(),
                partial_output: None,
            })?;
        let create_dirs = params
            .get("create_dirs")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let path = self.resolve(&params, context)?;
        if create_dirs {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ToolCoreError::ExecutionError {
                        message: format!("mkdir failed: {e}"),
                        partial_output: None,
                    })?;
            }
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolCoreError::ExecutionError {
                message: format!("write failed: {e}"),
                partial_output: None,
            })?;

        Ok(ToolResult::ok(format!(
            "wrote {} bytes to {}",
            content.len(),
            path.display()
        ))
        .with_metadata(json!({ "path": path.display().to_string(), "bytes": content.len() })))
    }

    fn affected_path(&self, params: &Value, context: &ExecutionContext) -> Option<PathBuf> {
        self.resolve(params, context).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse, PermissionMode};
    use std::sync::Arc;
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

    fn context(root: PathBuf) -> ExecutionContext {
        ExecutionContext::new("s", "m", Some(root), Arc::new(Always))
    }

    #[tokio::test]
    async fn writes_file_creating_parent_dirs() {
        let dir = tempdir().unwrap();
        let tool = WriteTool::new();
        tool.execute(
            json!({"file_path": "sub/a.txt", "content": "hello"}),
            &context(dir.path().to_path_buf()),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("sub/a.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn refuses_writes_in_plan_mode() {
        let dir = tempdir().unwrap();
        let tool = WriteTool::new();
        let ctx = context(dir.path().to_path_buf()).with_permission_mode(PermissionMode::Plan);
        let result = tool
            .execute(json!({"file_path": "a.txt", "content": "x"}), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(!dir.path().join("a.txt").exists());
    }
}
