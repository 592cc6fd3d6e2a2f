//! Snapshot Store (C5, spec.md §4.4).
//!
//! Per-file, content-hashed backups keyed by `(session_id, message_id,
//! absolute_path)`. The teacher's own `snapshot/backend.rs` is a
//! whole-worktree, git-commit-id based design (`SnapshotBackend::track`
//! takes a full tree diff) — a mismatch for this spec's per-file, per-call
//! versioned model, so this is a fresh design enriched with `sha2`/`hex`
//! from `oxicrab-oxicrab`'s dependency stack rather than adapted from
//! `gix`. The record shape and restore-by-rewrite operation are this
//! module's own; the purge-by-count convention mirrors the teacher's
//! `GcConfig { max_snapshots: Some(100), .. }` default.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error taking snapshot of {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no snapshot found for {path} in session {session_id}")]
    NotFound { session_id: String, path: PathBuf },
    #[error("backup content hash mismatch for {path}: recorded {recorded}, found {found}")]
    HashMismatch {
        path: PathBuf,
        recorded: String,
        found: String,
    },
}

/// `(session_id, message_id, absolute_path, version, backup_path, taken_at,
/// original_content_hash)` (spec.md §3 "Snapshot Record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub session_id: String,
    pub message_id: String,
    pub absolute_path: PathBuf,
    pub version: u64,
    pub backup_path: PathBuf,
    pub taken_at: String,
    pub original_content_hash: String,
    /// Set when `enable_checkpoints` was false: the record exists for
    /// bookkeeping but no bytes were ever copied.
    pub inert: bool,
}

fn hash_path(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub struct SnapshotStoreConfig {
    pub root_dir: PathBuf,
    pub enable_checkpoints: bool,
    /// Count-based purge threshold, default 100 per session (Open Question
    /// decision, SPEC_FULL.md §9).
    pub max_snapshots_per_session: usize,
}

impl Default for SnapshotStoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("file-history"),
            enable_checkpoints: true,
            max_snapshots_per_session: 100,
        }
    }
}

/// In-process index of taken snapshots, backed by files under `root_dir`.
pub struct SnapshotStore {
    config: SnapshotStoreConfig,
    // session_id -> ordered records, oldest first.
    index: Mutex<HashMap<String, Vec<SnapshotRecord>>>,
}

impl SnapshotStore {
    pub fn new(config: SnapshotStoreConfig) -> Self {
        Self {
            config,
            index: Mutex::new(HashMap::new()),
        }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.config.root_dir.join(session_id)
    }

    fn next_version(&self, session_id: &str, path: &Path) -> u64 {
        let index = self.index.lock().unwrap();
        index
            .get(session_id)
            .into_iter()
            .flatten()
            .filter(|r| r.absolute_path == path)
            .map(|r| r.version)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Snapshot `absolute_path` before a `Write`-kind tool mutates it
    /// (invariant I2: called before, never after).
    pub async fn snapshot(
        &self,
        session_id: &str,
        message_id: &str,
        absolute_path: &Path,
        taken_at: impl Into<String>,
    ) -> Result<SnapshotRecord, SnapshotError> {
        let taken_at = taken_at.into();
        if !self.config.enable_checkpoints {
            let record = SnapshotRecord {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                absolute_path: absolute_path.to_path_buf(),
                version: 0,
                backup_path: PathBuf::new(),
                taken_at,
                original_content_hash: String::new(),
                inert: true,
            };
            self.index
                .lock()
                .unwrap()
                .entry(session_id.to_string())
                .or_default()
                .push(record.clone());
            return Ok(record);
        }

        let bytes = tokio::fs::read(absolute_path)
            .await
            .map_err(|e| SnapshotError::Io {
                path: absolute_path.to_path_buf(),
                source: e,
            })?;
        let content_hash = hash_bytes(&bytes);
        let version = self.next_version(session_id, absolute_path);
        let backup_name = format!("{}@v{version}", hash_path(absolute_path));
        let backup_path = self.session_dir(session_id).join(backup_name);

        if let Some(parent) = backup_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SnapshotError::Io {
                    path: backup_path.clone(),
                    source: e,
                })?;
        }
        tokio::fs::write(&backup_path, &bytes)
            .await
            .map_err(|e| SnapshotError::Io {
                path: backup_path.clone(),
                source: e,
            })?;

        let record = SnapshotRecord {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            absolute_path: absolute_path.to_path_buf(),
            version,
            backup_path,
            taken_at,
            original_content_hash: content_hash,
            inert: false,
        };

        self.index
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push(record.clone());

        self.purge_if_needed(session_id).await;

        Ok(record)
    }

    /// Restore the snapshot taken for `(session_id, message_id,
    /// absolute_path)` — the latest version recorded under that message, if
    /// that file was snapshotted more than once for it (spec.md §3/§4.4:
    /// the Snapshot Record key and `restore` are addressed by the full
    /// 3-tuple, not by session and path alone).
    pub async fn restore(
        &self,
        session_id: &str,
        message_id: &str,
        absolute_path: &Path,
    ) -> Result<(), SnapshotError> {
        let record = {
            let index = self.index.lock().unwrap();
            index
                .get(session_id)
                .into_iter()
                .flatten()
                .filter(|r| r.absolute_path == absolute_path && r.message_id == message_id && !r.inert)
                .max_by_key(|r| r.version)
                .cloned()
                .ok_or_else(|| SnapshotError::NotFound {
                    session_id: session_id.to_string(),
                    path: absolute_path.to_path_buf(),
                })?
        };

        let bytes = tokio::fs::read(&record.backup_path)
            .await
            .map_err(|e| SnapshotError::Io {
                path: record.backup_path.clone(),
                source: e,
            })?;
        let found = hash_bytes(&bytes);
        if found != record.original_content_hash {
            return Err(SnapshotError::HashMismatch {
                path: record.backup_path.clone(),
                recorded: record.original_content_hash.clone(),
                found,
            });
        }

        // Atomic rewrite: write to a sibling temp file, then rename.
        let tmp_path = absolute_path.with_extension("toolcore-restore-tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| SnapshotError::Io {
                path: tmp_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, absolute_path)
            .await
            .map_err(|e| SnapshotError::Io {
                path: absolute_path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    async fn purge_if_needed(&self, session_id: &str) {
        let to_remove: Vec<SnapshotRecord> = {
            let mut index = self.index.lock().unwrap();
            let Some(records) = index.get_mut(session_id) else {
                return;
            };
            if records.len() <= self.config.max_snapshots_per_session {
                return;
            }
            let excess = records.len() - self.config.max_snapshots_per_session;
            records.drain(0..excess).collect()
        };
        for record in to_remove {
            if !record.inert {
                let _ = tokio::fs::remove_file(&record.backup_path).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn snapshot_then_restore_round_trips_content() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        tokio::fs::write(&file_path, b"v1").await.unwrap();

        let store = SnapshotStore::new(SnapshotStoreConfig {
            root_dir: dir.path().join("file-history"),
            ..Default::default()
        });

        store
            .snapshot("sess", "msg-1", &file_path, "2026-01-01T00:00:00Z")
            .await
            .unwrap();

        tokio::fs::write(&file_path, b"v2-mutated").await.unwrap();
        store.restore("sess", "msg-1", &file_path).await.unwrap();

        let restored = tokio::fs::read_to_string(&file_path).await.unwrap();
        assert_eq!(restored, "v1");
    }

    #[tokio::test]
    async fn version_increments_per_file_per_session() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        tokio::fs::write(&file_path, b"v1").await.unwrap();
        let store = SnapshotStore::new(SnapshotStoreConfig {
            root_dir: dir.path().join("file-history"),
            ..Default::default()
        });

        let r1 = store
            .snapshot("sess", "msg-1", &file_path, "t1")
            .await
            .unwrap();
        tokio::fs::write(&file_path, b"v2").await.unwrap();
        let r2 = store
            .snapshot("sess", "msg-2", &file_path, "t2")
            .await
            .unwrap();

        assert_eq!(r1.version, 1);
        assert_eq!(r2.version, 2);
    }

    #[tokio::test]
    async fn disabled_checkpoints_returns_inert_record() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        tokio::fs::write(&file_path, b"v1").await.unwrap();
        let store = SnapshotStore::new(SnapshotStoreConfig {
            root_dir: dir.path().join("file-history"),
            enable_checkpoints: false,
            ..Default::default()
        });

        let record = store
            .snapshot("sess", "msg-1", &file_path, "t1")
            .await
            .unwrap();
        assert!(record.inert);
        assert!(!record.backup_path.exists());
    }

    #[tokio::test]
    async fn purge_removes_oldest_past_the_cap() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(SnapshotStoreConfig {
            root_dir: dir.path().join("file-history"),
            max_snapshots_per_session: 2,
            ..Default::default()
        });

        for i in 0..3 {
            let file_path = dir.path().join(format!("f{i}.txt"));
            tokio::fs::write(&file_path, b"data").await.unwrap();
            store
                .snapshot("sess", "msg", &file_path, "t")
                .await
                .unwrap();
        }

        let index = store.index.lock().unwrap();
        assert_eq!(index.get("sess").unwrap().len(), 2);
    }
}
