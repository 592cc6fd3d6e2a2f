//! Background Process manager (spec.md §4.5 "Background Process").
//!
//! Each spawned process is driven by a drainer task reading stdout/stderr
//! into bounded rings (never blocking the child), mirroring the cancellable
//! wait idiom in `tools/builtins/shell.rs::ShellTool::call` — generalized
//! here to a detached, pollable handle instead of an inline awaited call.

use super::ring::OutputRing;
use super::SubprocessError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use serde::Serialize;
use tokio::sync::Notify;

const DEFAULT_RING_CAPACITY: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Running,
    Exited,
    Killed,
    Failed,
}

pub struct BackgroundProcessHandle {
    pub id: String,
    pub kind: String,
    pub pid: Option<u32>,
    pub started_at: String,
    status: Mutex<ProcessStatus>,
    ended_at: Mutex<Option<String>>,
    exit_code: Mutex<Option<i32>>,
    stdout_ring: Mutex<OutputRing>,
    stderr_ring: Mutex<OutputRing>,
    done: Arc<Notify>,
    kill_tx: tokio::sync::watch::Sender<bool>,
}

impl BackgroundProcessHandle {
    pub fn status(&self) -> ProcessStatus {
        *self.status.lock()
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock()
    }

    /// `consume_output(block, timeout) -> {stdout_delta, stderr_delta, status, exit_code, truncated}`.
    pub async fn consume_output(
        &self,
        block: bool,
        timeout: Option<Duration>,
    ) -> ConsumeOutput {
        if block && self.status() == ProcessStatus::Running {
            let wait = self.done.notified();
            match timeout {
                Some(d) => {
                    let _ = tokio::time::timeout(d, wait).await;
                }
                None => wait.await,
            }
        }

        let (stdout_delta, stdout_truncated) = self.stdout_ring.lock().drain();
        let (stderr_delta, stderr_truncated) = self.stderr_ring.lock().drain();

        ConsumeOutput {
            stdout_delta,
            stderr_delta,
            status: self.status(),
            exit_code: self.exit_code(),
            truncated: stdout_truncated || stderr_truncated,
        }
    }

    pub fn kill(&self) {
        let _ = self.kill_tx.send(true);
    }

    pub fn ended_at(&self) -> Option<String> {
        self.ended_at.lock().clone()
    }
}

pub struct ConsumeOutput {
    pub stdout_delta: Vec<u8>,
    pub stderr_delta: Vec<u8>,
    pub status: ProcessStatus,
    pub exit_code: Option<i32>,
    pub truncated: bool,
}

pub struct BackgroundProcessManager {
    processes: Mutex<HashMap<String, Arc<BackgroundProcessHandle>>>,
    live_count: Arc<AtomicU32>,
    max_concurrent: u32,
    next_id: AtomicU32,
}

impl BackgroundProcessManager {
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            processes: Mutex::new(HashMap::new()),
            live_count: Arc::new(AtomicU32::new(0)),
            max_concurrent,
            next_id: AtomicU32::new(0),
        }
    }

    pub fn spawn(
        &self,
        prefix: &str,
        command: &str,
        args: &[String],
        cwd: Option<&std::path::Path>,
        env: &[(String, String)],
        started_at: impl Into<String>,
    ) -> Result<Arc<BackgroundProcessHandle>, SubprocessError> {
        if self.live_count.load(Ordering::SeqCst) >= self.max_concurrent {
            return Err(SubprocessError::ConcurrentLimit {
                hint: format!(
                    "at most {} background processes may run concurrently; wait for one to finish or kill it first",
                    self.max_concurrent
                ),
            });
        }

        let id = format!(
            "{prefix}_{:x}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );

        let mut cmd = Command::new(command);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SubprocessError::Spawn(e.to_string()))?;
        let pid = child.id();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let handle = Arc::new(BackgroundProcessHandle {
            id: id.clone(),
            kind: prefix.to_string(),
            pid,
            started_at: started_at.into(),
            status: Mutex::new(ProcessStatus::Running),
            ended_at: Mutex::new(None),
            exit_code: Mutex::new(None),
            stdout_ring: Mutex::new(OutputRing::new(DEFAULT_RING_CAPACITY)),
            stderr_ring: Mutex::new(OutputRing::new(DEFAULT_RING_CAPACITY)),
            done: Arc::new(Notify::new()),
            kill_tx: tokio::sync::watch::channel(false).0,
        });

        self.processes.lock().insert(id.clone(), handle.clone());
        self.live_count.fetch_add(1, Ordering::SeqCst);

        let mut kill_rx = handle.kill_tx.subscribe();
        let drainer_handle = handle.clone();
        let live_count = self.live_count.clone();

        tokio::spawn(async move {
            let stdout_handle = drainer_handle.clone();
            let stderr_handle = drainer_handle.clone();
            let drain_stdout = async move {
                if let Some(mut s) = stdout {
                    let mut buf = [0u8; 8192];
                    loop {
                        match s.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => stdout_handle.stdout_ring.lock().push(&buf[..n]),
                        }
                    }
                }
            };
            let drain_stderr = async move {
                if let Some(mut s) = stderr {
                    let mut buf = [0u8; 8192];
                    loop {
                        match s.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => stderr_handle.stderr_ring.lock().push(&buf[..n]),
                        }
                    }
                }
            };

            tokio::select! {
                _ = async { tokio::join!(drain_stdout, drain_stderr) } => {
                    let status = child.wait().await.ok();
                    *drainer_handle.exit_code.lock() = status.and_then(|s| s.code());
                    *drainer_handle.status.lock() = ProcessStatus::Exited;
                }
                _ = kill_rx.changed() => {
                    let _ = child.start_kill();
                    let status = child.wait().await.ok();
                    *drainer_handle.exit_code.lock() = status.and_then(|s| s.code());
                    *drainer_handle.status.lock() = ProcessStatus::Killed;
                }
            }
            let ended_at = time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default();
            *drainer_handle.ended_at.lock() = Some(ended_at);
            live_count.fetch_sub(1, Ordering::SeqCst);
            drainer_handle.done.notify_waiters();
        });

        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<Arc<BackgroundProcessHandle>> {
        self.processes.lock().get(id).cloned()
    }

    pub fn kill(&self, id: &str) -> Result<(), SubprocessError> {
        let handle = self
            .get(id)
            .ok_or_else(|| SubprocessError::NotFound(id.to_string()))?;
        handle.kill();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_consume_output_blocking() {
        let manager = BackgroundProcessManager::new(16);
        let handle = manager
            .spawn("bash", "sh", &["-c".into(), "echo hi".into()], None, &[], "t0")
            .unwrap();

        let out = handle.consume_output(true, Some(Duration::from_secs(5))).await;
        assert_eq!(out.status, ProcessStatus::Exited);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(String::from_utf8_lossy(&out.stdout_delta).trim(), "hi");
    }

    #[tokio::test]
    async fn concurrency_cap_rejects_overflow() {
        let manager = BackgroundProcessManager::new(1);
        let _first = manager
            .spawn("bash", "sh", &["-c".into(), "sleep 1".into()], None, &[], "t0")
            .unwrap();
        let second = manager.spawn("bash", "sh", &["-c".into(), "echo hi".into()], None, &[], "t0");
        assert!(matches!(second, Err(SubprocessError::ConcurrentLimit { .. })));
    }

    #[tokio::test]
    async fn kill_transitions_status_to_killed() {
        let manager = BackgroundProcessManager::new(16);
        let handle = manager
            .spawn("bash", "sh", &["-c".into(), "sleep 5".into()], None, &[], "t0")
            .unwrap();
        handle.kill();
        let out = handle.consume_output(true, Some(Duration::from_secs(5))).await;
        assert_eq!(out.status, ProcessStatus::Killed);
    }
}
