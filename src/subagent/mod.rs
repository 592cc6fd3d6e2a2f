//! Subagent Scheduler (C10, spec.md §4.9).
//!
//! The nested "nested assistant loop" itself is out of scope for this
//! crate (spec.md §1: the language model and its conversation loop are
//! "thin, well-understood collaborators") — callers inject one via
//! `AgentLoopRunner`, the same seam the teacher uses for `SendAgent` in
//! `delegation/core.rs::DelegationOrchestrator` (an injected trait object
//! standing in for "go run a nested agent", rather than this crate owning
//! the kameo/ACP actor mesh that drives it).

mod record;
mod store;

pub use record::{TaskRecord, TaskStatus, TokenUsage};
pub use store::TaskStore;

use crate::errors::ToolCoreError;
use crate::tool::{ExecutionContext, ToolResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// A nested agent loop, injected by the embedder. `Task`'s `execute` calls
/// through the scheduler to this trait rather than owning conversation/LLM
/// logic itself.
#[async_trait]
pub trait AgentLoopRunner: Send + Sync {
    async fn run(&self, goal: String, context: ExecutionContext) -> Result<ToolResult, ToolCoreError>;
}

struct TaskHandle {
    notify: Arc<Notify>,
}

pub struct SubagentScheduler {
    runner: Arc<dyn AgentLoopRunner>,
    store: Arc<TaskStore>,
    semaphore: Arc<Semaphore>,
    handles: Mutex<HashMap<String, Arc<TaskHandle>>>,
    ttl: Duration,
}

impl SubagentScheduler {
    /// `max_concurrent` default 5 (spec.md §4.9 synchronous-mode cap).
    /// Recovers any task left `Running` by a previous, now-dead process.
    pub async fn new(runner: Arc<dyn AgentLoopRunner>, store_root: PathBuf, max_concurrent: usize) -> Self {
        let store = Arc::new(TaskStore::new(store_root));
        store.recover_interrupted(now_rfc3339()).await;
        Self {
            runner,
            store,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            handles: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(3600),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Synchronous mode: runs inline, failing with `ConcurrentLimitError`
    /// and a background-mode hint if the cap is already saturated.
    pub async fn run_synchronous(
        &self,
        goal: String,
        context: ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        let _permit = self.semaphore.clone().try_acquire_owned().map_err(|_| {
            ToolCoreError::ConcurrentLimitError {
                resource: "subagent".into(),
                hint: "too many subagents running concurrently; retry with Task(background=true)".into(),
            }
        })?;
        self.runner.run(goal, context).await
    }

    /// Background mode: persists a `Running` record, spawns the nested loop
    /// detached, and returns its handle id immediately.
    pub async fn spawn_background(
        &self,
        goal: String,
        context: ExecutionContext,
    ) -> Result<String, ToolCoreError> {
        let id = format!("agent_{}", nanoid::nanoid!(12));
        let record = TaskRecord::new(id.clone(), goal.clone(), now_rfc3339());
        self.store
            .persist(&record)
            .await
            .map_err(|e| ToolCoreError::ExecutionError {
                message: e.to_string(),
                partial_output: None,
            })?;

        let notify = Arc::new(Notify::new());
        self.handles
            .lock()
            .insert(id.clone(), Arc::new(TaskHandle { notify: notify.clone() }));

        let runner = self.runner.clone();
        let store = self.store.clone();
        let semaphore = self.semaphore.clone();
        let task_id = id.clone();

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("subagent semaphore is never closed");
            let outcome = runner.run(goal, context).await;

            let mut record = store
                .load_snapshot(&task_id)
                .await
                .unwrap_or_else(|| TaskRecord::new(task_id.clone(), "", now_rfc3339()));
            record.updated_at = now_rfc3339();
            match outcome {
                Ok(tool_result) => {
                    record.status = TaskStatus::Completed;
                    record.result = serde_json::to_value(&tool_result).ok();
                }
                Err(e) => {
                    record.status = TaskStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
            let _ = store.persist(&record).await;
            notify.notify_waiters();
        });

        Ok(id)
    }

    /// Used by the `TaskOutput` tool: block-or-poll-waits on a background
    /// task's record. Returns the current record even if it is still
    /// `Running` when `timeout` elapses (the caller polls again). Re-reads
    /// the persisted snapshot on every wake so a `notify_waiters()` that
    /// fires between our check and our wait is never silently missed.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<TaskRecord, ToolCoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        const POLL_INTERVAL: Duration = Duration::from_millis(100);

        loop {
            let Some(record) = self.store.load_snapshot(id).await else {
                return Err(ToolCoreError::InternalError(format!(
                    "no such subagent task `{id}`"
                )));
            };
            if record.is_terminal() {
                return Ok(record);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(record);
            }
            let wait_for = (deadline - now).min(POLL_INTERVAL);

            let handle = self.handles.lock().get(id).cloned();
            match handle {
                Some(h) => {
                    let _ = tokio::time::timeout(wait_for, h.notify.notified()).await;
                }
                None => tokio::time::sleep(wait_for).await,
            }
        }
    }

    /// Removes snapshot files for terminal tasks past the TTL (spec.md
    /// §4.9: default 1 hour).
    pub async fn cleanup_expired(&self) {
        self.store
            .cleanup_expired(self.ttl, time::OffsetDateTime::now_utc())
            .await;
    }
}
