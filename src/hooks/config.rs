//! Hook data model (spec.md §3 "Hook Config", §4.3).

use serde::{Deserialize, Serialize};

/// Events the Hook Engine dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    Stop,
}

/// A scalar-or-array predicate value; any-match within an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrArray {
    Scalar(String),
    Array(Vec<String>),
}

impl ScalarOrArray {
    pub fn values(&self) -> &[String] {
        match self {
            ScalarOrArray::Scalar(s) => std::slice::from_ref(s),
            ScalarOrArray::Array(v) => v,
        }
    }
}

/// How a `124` (timeout) exit should be treated (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutBehavior {
    Ignore,
    Deny,
    #[default]
    Ask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Hook {
    Command {
        command: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        timeout_behavior: TimeoutBehavior,
    },
    Prompt {
        prompt: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    60
}

/// One matcher: fires when every present predicate holds (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Matcher {
    pub tools: Option<ScalarOrArray>,
    pub paths: Option<ScalarOrArray>,
    pub commands: Option<ScalarOrArray>,
    pub hooks: Vec<Hook>,
}

/// `event -> ordered matcher list` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HookConfig {
    pub pre_tool_use: Vec<Matcher>,
    pub post_tool_use: Vec<Matcher>,
    pub stop: Vec<Matcher>,
}

impl HookConfig {
    pub fn matchers_for(&self, event: HookEvent) -> &[Matcher] {
        match event {
            HookEvent::PreToolUse => &self.pre_tool_use,
            HookEvent::PostToolUse => &self.post_tool_use,
            HookEvent::Stop => &self.stop,
        }
    }
}
