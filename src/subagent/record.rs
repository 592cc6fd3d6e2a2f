//! Persisted subagent task record (spec.md §4.9, §6 "Persisted state layout").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    /// Recovered at startup from a record that was `Running` when the
    /// process last exited (spec.md §4.9: "crashes mid-task recover as
    /// `failed` with reason `interrupted (system restart)`").
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub goal: String,
    pub status: TaskStatus,
    pub created_at: String,
    pub updated_at: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, goal: impl Into<String>, now: impl Into<String>) -> Self {
        let now = now.into();
        Self {
            id: id.into(),
            goal: goal.into(),
            status: TaskStatus::Running,
            created_at: now.clone(),
            updated_at: now,
            result: None,
            error: None,
            token_usage: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, TaskStatus::Running)
    }
}
