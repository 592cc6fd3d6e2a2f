//! Built-in tools (spec.md §4.2's registry seeds every embedder gets for free).
//!
//! Each module owns one `Tool` impl, grounded on the matching file under
//! `tools/builtins/` in the teacher crate. `Task`/`TaskOutput` are wired to
//! this crate's own Subagent Scheduler (C10) and Background Process manager
//! (C6) rather than the teacher's delegation actor mesh.

mod edit;
mod glob_tool;
mod memory;
mod read;
mod search_text;
mod shell;
mod task;
mod task_output;
mod think;
mod write;

pub use edit::EditTool;
pub use glob_tool::GlobTool;
pub use memory::MemoryTool;
pub use read::ReadTool;
pub use search_text::GrepTool;
pub use shell::ShellTool;
pub use task::TaskTool;
pub use task_output::TaskOutputTool;
pub use think::ThinkTool;
pub use write::WriteTool;
