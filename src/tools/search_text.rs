//! Grep tool: regex content search across the workspace, gitignore-aware.
//!
//! Grounded on `tools/builtins/search_text.rs::SearchTextTool`.

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, Tool, ToolDefinition, ToolKind, ToolResult};
use async_trait::async_trait;
use glob::Pattern;
use grep_regex::RegexMatcher;
use grep_searcher::{sinks::Lossy, Searcher};
use ignore::WalkBuilder;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Debug, Serialize)]
struct Match {
    file: String,
    line: u64,
    text: String,
}

#[derive(Debug, Serialize)]
struct SearchResults {
    matches: Vec<Match>,
    files_searched: usize,
    truncated: bool,
}

pub struct GrepTool {
    definition: ToolDefinition,
}

impl Default for GrepTool {
    fn default() -> Self {
        Self::new()
    }
}

impl GrepTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "Grep",
            ToolKind::ReadOnly,
            json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regex pattern to search for in file contents." },
                    "path": { "type": "string", "description": "Directory to search. Defaults to the workspace root." },
                    "include": { "type": "string", "description": "Glob filter for files to search, e.g. \"*.rs\"." },
                    "max_results": { "type": "integer", "minimum": 1, "default": DEFAULT_MAX_RESULTS }
                },
                "required": ["pattern"]
            }),
        )
        .with_description(
            "Search file contents by regex",
            "Fast, gitignore-aware regex search across the workspace, returning file \
             paths and line numbers.",
        );
        Self { definition }
    }

    fn search(
        root: &Path,
        pattern: &str,
        include: Option<String>,
        max_results: usize,
    ) -> Result<SearchResults, String> {
        let matcher = RegexMatcher::new(pattern).map_err(|e| e.to_string())?;
        let include_pattern = include.map(|p| Pattern::new(&p)).transpose().map_err(|e| e.to_string())?;

        let mut matches = Vec::new();
        let mut files_searched = 0;

        for entry in WalkBuilder::new(root).hidden(false).git_ignore(true).build() {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if let Some(ref pat) = include_pattern {
                let Ok(relative) = path.strip_prefix(root) else { continue };
                if !pat.matches_path(relative) {
                    continue;
                }
            }

            files_searched += 1;
            let _ = Searcher::new().search_path(
                &matcher,
                path,
                Lossy(|lnum, line| {
                    if matches.len() >= max_results {
                        return Ok(false);
                    }
                    matches.push(Match {
                        file: path.display().to_string(),
                        line: lnum,
                        text: line.trim_end().to_string(),
                    });
                    Ok(true)
                }),
            );
            if matches.len() >= max_results {
                break;
            }
        }

        let truncated = matches.len() >= max_results;
        Ok(SearchResults { matches, files_searched, truncated })
    }
}

#[async_trait]
impl Tool for GrepTool {
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
        let include = params.get("include").and_then(Value::as_str).map(str::to_string);
        let max_results = params
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_RESULTS as u64) as usize;

        let results = tokio::task::spawn_blocking(move || Self::search(&root, &pattern, include, max_results))
            .await
            .map_err(|e| ToolCoreError::ExecutionError {
                message: format!("search task panicked: {e}"),
                partial_output: None,
            })?
            .map_err(|message| ToolCoreError::ExecutionError { message, partial_output: None })?;

        let body = serde_json::to_string_pretty(&results).map_err(|e| ToolCoreError::ExecutionError {
            message: e.to_string(),
            partial_output: None,
        })?;
        Ok(ToolResult::ok(body))
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

    #[tokio::test]
    async fn finds_matching_lines() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world\nrust is great").unwrap();
        let tool = GrepTool::new();
        let ctx = ExecutionContext::new("s", "m", Some(dir.path().to_path_buf()), Arc::new(Always));

        let result = tool.execute(json!({"pattern": "rust"}), &ctx).await.unwrap();
        assert!(result.llm_content.contains("\"line\": 2"));
    }

    #[tokio::test]
    async fn include_filter_restricts_to_matching_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("a.rs"), "hello").unwrap();
        let tool = GrepTool::new();
        let ctx = ExecutionContext::new("s", "m", Some(dir.path().to_path_buf()), Arc::new(Always));

        let result = tool
            .execute(json!({"pattern": "hello", "include": "*.rs"}), &ctx)
            .await
            .unwrap();
        assert!(result.llm_content.contains("a.rs"));
        assert!(!result.llm_content.contains("a.txt"));
    }
}
