//! Tool definitions: the immutable descriptor each tool exposes (spec.md §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Coarse category of a tool, used for permission defaults and UI hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadOnly,
    Write,
    Execute,
    Memory,
    Think,
}

impl ToolKind {
    /// Default permission decision when no rule matches (spec.md §3 Permission Rule).
    pub fn default_allows(self) -> bool {
        matches!(self, ToolKind::ReadOnly)
    }
}

/// Capability requirements a tool may need before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CapabilityRequirement {
    /// Requires a workspace root to be set in the execution context.
    Filesystem,
}

/// A short + long human description of a tool, for the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolDescription {
    pub short: String,
    pub long: String,
}

/// Projects a tool's params onto a stable cache key used by the Permission
/// Engine's grant cache (spec.md §3 Tool Definition: "signature extractor").
pub type SignatureExtractor = fn(&Value) -> String;

/// Maps a params-projection to an implicit wildcard used for grant lookup
/// (spec.md §3 Tool Definition: "abstract permission rule").
pub type AbstractRuleExtractor = fn(&Value) -> Option<String>;

/// Immutable descriptor for a tool, read-only after registration (invariant I1).
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: Arc<str>,
    pub kind: ToolKind,
    pub description: ToolDescription,
    /// JSON Schema (draft 2020-12 subset) for this tool's parameters.
    pub parameter_schema: Value,
    pub required_capabilities: &'static [CapabilityRequirement],
    pub signature_extractor: Option<SignatureExtractor>,
    pub abstract_rule_extractor: Option<AbstractRuleExtractor>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<Arc<str>>, kind: ToolKind, parameter_schema: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            description: ToolDescription::default(),
            parameter_schema,
            required_capabilities: &[],
            signature_extractor: None,
            abstract_rule_extractor: None,
        }
    }

    pub fn with_description(mut self, short: impl Into<String>, long: impl Into<String>) -> Self {
        self.description = ToolDescription {
            short: short.into(),
            long: long.into(),
        };
        self
    }

    pub fn with_capabilities(mut self, caps: &'static [CapabilityRequirement]) -> Self {
        self.required_capabilities = caps;
        self
    }

    pub fn with_signature_extractor(mut self, f: SignatureExtractor) -> Self {
        self.signature_extractor = Some(f);
        self
    }

    pub fn with_abstract_rule_extractor(mut self, f: AbstractRuleExtractor) -> Self {
        self.abstract_rule_extractor = Some(f);
        self
    }

    /// The tool's primary argument used for permission pattern matching
    /// (spec.md §4.2: Bash → `command`; file tools → `file_path`).
    pub fn primary_argument<'a>(&self, params: &'a Value) -> Option<&'a str> {
        params
            .get("command")
            .or_else(|| params.get("file_path"))
            .or_else(|| params.get("path"))
            .and_then(Value::as_str)
    }
}
