//! Read tool: line-numbered file reads with an optional line range.
//!
//! Grounded on `tools/builtins/read_file.rs::ReadFileTool`.

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

pub struct ReadTool {
    definition: ToolDefinition,
}

impl Default for ReadTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "Read",
            ToolKind::ReadOnly,
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to read, relative to the workspace root or absolute."
                    },
                    "start_line": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Line number to start reading from (1-indexed, inclusive)."
                    },
                    "line_count": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of lines to read from start_line."
                    }
                },
                "required": ["file_path"]
            }),
        )
        .with_description(
            "Read a file's contents",
            "Reads contents of a file under the workspace. Returns content with line \
             numbers in the format `00001| content`. Supports reading the full file or \
             a specific line range.",
        );
        Self { definition }
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let path_arg = params
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "file_path is required".into(),
                partial_output: None,
            })?;
        let path = context.resolve_path(path_arg)?;

        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ToolCoreError::ExecutionError {
                    message: format!("failed to read `{}`: {e}", path.display()),
                    partial_output: None,
                })?;

        let start_line = params.get("start_line").and_then(Value::as_u64).map(|v| v as usize);
        let line_count = params.get("line_count").and_then(Value::as_u64).map(|v| v as usize);

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let (start_idx, end_idx) = match (start_line, line_count) {
            (None, None) => (0, total_lines),
            (Some(start), count) => {
                if start < 1 {
                    return Ok(ToolResult::err("InvalidParams", "start_line must be >= 1"));
                }
                if total_lines > 0 && start > total_lines {
                    return Ok(ToolResult::err(
                        "InvalidParams",
                        format!("start_line {start} exceeds file length {total_lines}"),
                    ));
                }
                let start_idx = start.saturating_sub(1);
                let end_idx = match count {
                    Some(c) => (start_idx + c).min(total_lines),
                    None => total_lines,
                };
                (start_idx, end_idx)
            }
            (None, Some(_)) => {
                return Ok(ToolResult::err(
                    "InvalidParams",
                    "line_count requires start_line to be specified",
                ));
            }
        };

        let mut output = String::from("<file>\n");
        for (idx, line) in lines.iter().enumerate().take(end_idx).skip(start_idx) {
            output.push_str(&format!("{:05}| {}\n", idx + 1, line));
        }
        if end_idx < total_lines {
            output.push_str(&format!(
                "\n(File has more lines. Use start_line to read beyond line {end_idx})\n"
            ));
        } else {
            output.push_str(&format!("\n(End of file - total {total_lines} lines)\n"));
        }
        output.push_str("</file>");

        Ok(ToolResult::ok(output))
    }

    fn affected_path(&self, _params: &Value, _context: &ExecutionContext) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse};
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
    async fn reads_full_file_with_line_numbers() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree").unwrap();
        let tool = ReadTool::new();
        let result = tool
            .execute(json!({"file_path": "a.txt"}), &context(dir.path().to_path_buf()))
            .await
            .unwrap();
        assert!(result.llm_content.contains("00001| one"));
        assert!(result.llm_content.contains("(End of file - total 3 lines)"));
    }

    #[tokio::test]
    async fn reads_a_line_range() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\nfour").unwrap();
        let tool = ReadTool::new();
        let result = tool
            .execute(
                json!({"file_path": "a.txt", "start_line": 2, "line_count": 2}),
                &context(dir.path().to_path_buf()),
            )
            .await
            .unwrap();
        assert!(result.llm_content.contains("00002| two"));
        assert!(result.llm_content.contains("00003| three"));
        assert!(!result.llm_content.contains("00001| one"));
    }

    #[tokio::test]
    async fn missing_file_is_an_execution_error() {
        let dir = tempdir().unwrap();
        let tool = ReadTool::new();
        let err = tool
            .execute(json!({"file_path": "missing.txt"}), &context(dir.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolCoreError::ExecutionError { .. }));
    }
}
