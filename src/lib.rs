//! Tool execution core for an interactive agentic coding assistant.
//!
//! Ties together a schema validator (C1), permission engine and consent
//! gate (C2/C3), hook engine (C4), snapshot store (C5), subprocess manager
//! (C6), protocol client (C7), tool registry (C8), execution pipeline
//! (C9), subagent scheduler (C10), and a seed set of built-in tools.
//! Grounded on `querymt-agent`'s crate layout: one module per concern,
//! re-exported flat from the crate root the way its own `lib.rs` does.

pub mod config;
pub mod consent;
pub mod errors;
pub mod hooks;
pub mod logging;
pub mod permissions;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod snapshot;
pub mod subagent;
pub mod subprocess;
pub mod tool;
pub mod tools;

pub use config::{Config, ConfigError};
pub use consent::ConsentGate;
pub use errors::{Stage, ToolCoreError};
pub use hooks::{Hook, HookConfig, HookEngine, HookError, HookEvent, HookInput, Matcher, MatchTarget};
pub use permissions::{classify, Decision, GrantCache, PermissionError, PermissionRule, PolicyConfig, RuleList};
pub use pipeline::{BoundedHistory, HistoryEntry, HistorySink, NullHistorySink, Pipeline};
pub use protocol::{ConnectionState, HealthCheckConfig, ProtocolClient, ReconnectPolicy, ServerConfig};
pub use registry::{RegistryError, ToolRegistry};
pub use schema::{SchemaValidator, ValidationError};
pub use snapshot::{SnapshotError, SnapshotRecord, SnapshotStore, SnapshotStoreConfig};
pub use subagent::{AgentLoopRunner, SubagentScheduler, TaskRecord, TaskStatus};
pub use subprocess::{BackgroundProcessManager, ShellSession, SubprocessError, SubprocessManager};
pub use tool::{
    ConfirmationChannel, ConfirmationRequest, ConfirmationResponse, ExecutionContext, GrantScope,
    PermissionMode, Tool, ToolDefinition, ToolKind, ToolResult,
};
pub use tools::{
    EditTool, GlobTool, GrepTool, MemoryTool, ReadTool, ShellTool as BashTool, TaskOutputTool, TaskTool,
    ThinkTool, WriteTool,
};
