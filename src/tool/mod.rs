//! Shared tool data model (spec.md §3): definitions, execution context, results.
//!
//! Grounded on `querymt-agent`'s `tools/context.rs` (the `Tool`/`ToolContext`
//! split) and `tools/registry.rs`.

pub mod context;
pub mod definition;
pub mod result;

pub use context::{
    ConfirmationChannel, ConfirmationKind, ConfirmationRequest, ConfirmationResponse,
    ExecutionContext, GrantScope, NullProgressSink, PermissionMode, ProgressSink,
};
pub use definition::{
    AbstractRuleExtractor, CapabilityRequirement, SignatureExtractor, ToolDefinition,
    ToolDescription, ToolKind,
};
pub use result::{ResultError, ToolResult};

use async_trait::async_trait;
use serde_json::Value;

/// A tool's capability set (spec.md §9 REDESIGN FLAGS: "trait-like capability
/// set `{validate, execute, describe, signature, affected_paths,
/// needs_confirmation}`").
///
/// `validate`/`describe` are carried by `ToolDefinition` (C1 consumes the
/// schema, the registry exposes the description); this trait is the
/// remainder: the actual body, plus the two projections the rest of the
/// pipeline needs (a confirmation-affecting path, and a primary argument for
/// permission-pattern matching, which lives on `ToolDefinition` itself).
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    /// Execute with validated (and possibly hook-modified) params.
    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, crate::errors::ToolCoreError>;

    /// The absolute path this invocation would mutate, if any — used by the
    /// Snapshot Store (C5) to know what to back up before a `Write` tool runs.
    fn affected_path(&self, _params: &Value, _context: &ExecutionContext) -> Option<std::path::PathBuf> {
        None
    }

    fn name(&self) -> &str {
        &self.definition().name
    }

    fn kind(&self) -> ToolKind {
        self.definition().kind
    }
}
