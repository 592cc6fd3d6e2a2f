//! Subagent task persistence (spec.md §6: `subagent-tasks/tasks.jsonl` +
//! `subagent-tasks/<task_id>.json`).
//!
//! The `.jsonl` file is an append-only audit log of every status transition,
//! in the same line-delimited style as `pipeline::history::JsonlFileHistorySink`.
//! The per-task `.json` file is the latest snapshot, read back for recovery
//! and for `wait_for_completion` polling.

use super::record::{TaskRecord, TaskStatus};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

pub struct TaskStore {
    root_dir: PathBuf,
}

impl TaskStore {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    fn log_path(&self) -> PathBuf {
        self.root_dir.join("tasks.jsonl")
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.root_dir.join(format!("{id}.json"))
    }

    async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await
    }

    /// Append one line to the audit log and overwrite the task's snapshot.
    pub async fn persist(&self, record: &TaskRecord) -> std::io::Result<()> {
        self.ensure_root().await?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut log_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .await?;
        log_file.write_all(&line).await?;

        tokio::fs::write(self.snapshot_path(&record.id), serde_json::to_vec_pretty(record)?).await
    }

    pub async fn load_snapshot(&self, id: &str) -> Option<TaskRecord> {
        let bytes = tokio::fs::read(self.snapshot_path(id)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn list_snapshots(&self) -> Vec<TaskRecord> {
        let Ok(mut entries) = tokio::fs::read_dir(&self.root_dir).await else {
            return Vec::new();
        };
        let mut records = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(bytes) = tokio::fs::read(&path).await {
                if let Ok(record) = serde_json::from_slice::<TaskRecord>(&bytes) {
                    records.push(record);
                }
            }
        }
        records
    }

    /// Called once at scheduler startup: any snapshot still `Running` means
    /// the process exited mid-task. Mark it `Interrupted` and re-persist.
    pub async fn recover_interrupted(&self, now: impl Into<String> + Clone) -> Vec<TaskRecord> {
        let mut recovered = Vec::new();
        for mut record in self.list_snapshots().await {
            if record.status == TaskStatus::Running {
                record.status = TaskStatus::Interrupted;
                record.error = Some("interrupted (system restart)".to_string());
                record.updated_at = now.clone().into();
                let _ = self.persist(&record).await;
                recovered.push(record);
            }
        }
        recovered
    }

    /// Remove snapshot files for terminal tasks whose `updated_at` is older
    /// than `ttl` (default 1 hour, spec.md §4.9).
    pub async fn cleanup_expired(&self, ttl: std::time::Duration, now: time::OffsetDateTime) {
        for record in self.list_snapshots().await {
            if !record.is_terminal() {
                continue;
            }
            let Ok(updated_at) = time::OffsetDateTime::parse(
                &record.updated_at,
                &time::format_description::well_known::Rfc3339,
            ) else {
                continue;
            };
            if now - updated_at > ttl {
                let _ = tokio::fs::remove_file(self.snapshot_path(&record.id)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn now() -> String {
        "2026-01-01T00:00:00Z".to_string()
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = TaskStore::new(dir.path().to_path_buf());
        let record = TaskRecord::new("agent_abc", "fix the bug", now());
        store.persist(&record).await.unwrap();

        let loaded = store.load_snapshot("agent_abc").await.unwrap();
        assert_eq!(loaded.goal, "fix the bug");
        assert!(dir.path().join("tasks.jsonl").exists());
    }

    #[tokio::test]
    async fn recover_interrupted_marks_stale_running_tasks() {
        let dir = tempdir().unwrap();
        let store = TaskStore::new(dir.path().to_path_buf());
        let record = TaskRecord::new("agent_abc", "goal", now());
        store.persist(&record).await.unwrap();

        let recovered = store.recover_interrupted(now()).await;
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].status, TaskStatus::Interrupted);

        let reloaded = store.load_snapshot("agent_abc").await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Interrupted);
    }
}
