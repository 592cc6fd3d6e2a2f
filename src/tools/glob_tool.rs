//! Glob tool: find files by glob pattern, gitignore-aware, sorted by mtime.
//!
//! Grounded on `tools/builtins/glob.rs::GlobTool`.

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use glob::Pattern;
use ignore::WalkBuilder;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const DEFAULT_LIMIT: usize = 200;

pub struct GlobTool {
    definition: ToolDefinition,
}

impl Default for GlobTool {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "Glob",
            ToolKind::ReadOnly,
            json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Glob pattern, e.g. \"**/*.rs\"." },
                    "path": { "type": "string", "description": "Directory to search from. Defaults to the workspace root." },
                    "limit": { "type": "integer", "minimum": 1, "default": DEFAULT_LIMIT }
                },
                "required": ["pattern"]
            }),
        )
        .with_description(
            "Find files by glob pattern",
            "Finds files matching a glob pattern, skipping gitignored paths, \
             sorted by most recently modified first.",
        );
        Self { definition }
    }

    fn find(root: &Path, pattern: &str, limit: usize) -> Result<(Vec<PathBuf>, bool), String> {
        let pat = Pattern::new(pattern).map_err(|e| e.to_string())?;
        let mut hits: Vec<(PathBuf, SystemTime)> = Vec::new();

        for entry in WalkBuilder::new(root).hidden(false).git_ignore(true).build() {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else { continue };
            if !pat.matches_path(relative) {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            hits.push((path.to_path_buf(), modified));
        }

        hits.sort_by(|a, b| b.1.cmp(&a.1));
        let truncated = hits.len() > limit;
        hits.truncate(limit);
        Ok((hits.into_iter().map(|(p, _)| p).collect(), truncated))
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let pattern = params
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCoreError::ExecutionError {
                message: "pattern is required".into(),
                partial_output: None,
            })?
            .to_string();
        let root = match params.get("path").and_then(Value::as_str) {
            Some(p) => context.resolve_path(p)?,
            None => context
                .workspace_root
                .clone()
                .ok_or_else(|| ToolCoreError::ExecutionError {
                    message: "no workspace root set and no path given".into(),
                    partial_output: None,
                })?,
        };
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let (paths, truncated) = tokio::task::spawn_blocking(move || Self::find(&root, &pattern, limit))
            .await
            .map_err(|e| ToolCoreError::ExecutionError {
                message: format!("glob task panicked: {e}"),
                partial_output: None,
            })?
            .map_err(|message| ToolCoreError::ExecutionError { message, partial_output: None })?;

        let mut output = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        if truncated {
            output.push_str(&format!("\n... truncated to {limit} results"));
        }
        if output.is_empty() {
            output = "(no files matched)".to_string();
        }

        Ok(ToolResult::ok(output))
    }
}
