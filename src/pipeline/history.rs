//! Bounded execution history (spec.md §4.8 step 8).
//!
//! In-memory by default (`VecDeque` behind a mutex, capacity 1000, FIFO
//! eviction); an embedder may additionally plug in a `HistorySink` to
//! persist entries, mirroring the teacher's line-delimited task log
//! convention in `delegation/core.rs`.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub invocation_id: String,
    pub tool: String,
    pub params: Value,
    pub result: Value,
    pub start_time: String,
    pub end_time: String,
    pub context_subset: Value,
}

/// An embedder-pluggable persistence sink for history entries.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: &HistoryEntry);
}

pub struct NullHistorySink;

#[async_trait]
impl HistorySink for NullHistorySink {
    async fn record(&self, _entry: &HistoryEntry) {}
}

/// Appends each entry as one JSON line to a file, in the same style as the
/// teacher's `subagent-tasks/tasks.jsonl` background-task log.
pub struct JsonlFileHistorySink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlFileHistorySink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl HistorySink for JsonlFileHistorySink {
    async fn record(&self, entry: &HistoryEntry) {
        let _guard = self.lock.lock().await;
        let Ok(mut line) = serde_json::to_vec(entry) else {
            return;
        };
        line.push(b'\n');
        if let Ok(mut file) = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            let _ = file.write_all(&line).await;
        }
    }
}

pub struct BoundedHistory {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn push(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}

impl Default for BoundedHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> HistoryEntry {
        HistoryEntry {
            invocation_id: id.to_string(),
            tool: "Read".into(),
            params: Value::Null,
            result: Value::Null,
            start_time: "t0".into(),
            end_time: "t1".into(),
            context_subset: Value::Null,
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let history = BoundedHistory::new(2);
        history.push(entry("a"));
        history.push(entry("b"));
        history.push(entry("c"));
        let snap = history.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].invocation_id, "b");
        assert_eq!(snap[1].invocation_id, "c");
    }
}
