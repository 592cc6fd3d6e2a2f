//! Persistent Shell Session (spec.md §4.5).
//!
//! One interactive shell child process per session id, driven by writing
//! `command\n` to its stdin and draining stdout until an end-of-command
//! sentinel is observed. stderr has no such terminator in a long-lived
//! shell, so it's drained continuously by a background task (mirroring
//! `subprocess/background.rs`'s drain loop) instead of per-command.
//! Grounded on the same cancellable-wait shape as `tools/builtins/shell.rs`,
//! adapted from a one-shot spawn+wait to a long-lived, repeatedly-`run`-able
//! child.

use super::SubprocessError;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Printed after every command so `run` knows where the command's output
/// ends; chosen to be vanishingly unlikely to appear in real output.
const SENTINEL: &str = "__TOOLCORE_CMD_DONE_38f1b2__";

pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

pub struct ShellSession {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    reader: Mutex<BufReader<tokio::process::ChildStdout>>,
    /// Output read since the last completed (non-timed-out) command. Survives
    /// across a timed-out `run` call, since the read future is dropped (not
    /// cancelled mid-line) by `tokio::time::timeout` and the next `run` keeps
    /// reading from where the stream left off.
    pending_output: Mutex<String>,
    /// Stderr has no sentinel to bound it against (the shell's own `echo`
    /// for the sentinel only ever lands on stdout), so it's drained
    /// continuously by a background task instead of per-`run`; each `run`
    /// call just takes whatever accumulated since the last one.
    pending_stderr: Arc<Mutex<String>>,
}

impl ShellSession {
    pub fn spawn(cwd: Option<&std::path::Path>) -> Result<Self, SubprocessError> {
        let mut cmd = if cfg!(target_os = "windows") {
            Command::new("cmd")
        } else {
            Command::new("sh")
        };
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| SubprocessError::Spawn(e.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| {
            SubprocessError::Spawn("child has no stdin".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SubprocessError::Spawn("child has no stdout".into())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            SubprocessError::Spawn("child has no stderr".into())
        })?;

        let pending_stderr = Arc::new(Mutex::new(String::new()));
        let drain_target = pending_stderr.clone();
        tokio::spawn(async move {
            let mut stderr = stderr;
            let mut buf = [0u8; 8192];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]);
                        drain_target.lock().await.push_str(&chunk);
                    }
                }
            }
        });

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            reader: Mutex::new(BufReader::new(stdout)),
            pending_output: Mutex::new(String::new()),
            pending_stderr,
        })
    }

    /// Run `command`, returning once the sentinel is observed, the timeout
    /// fires, or `cancellation` fires.
    pub async fn run(
        &self,
        command: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<RunOutput, SubprocessError> {
        let mut stdin = self.stdin.lock().await;
        let payload = format!("{command}\necho {SENTINEL}\n");
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| SubprocessError::Io(e.to_string()))?;
        drop(stdin);

        let read_until_sentinel = async {
            let mut reader = self.reader.lock().await;
            loop {
                let mut line = String::new();
                let n = reader
                    .read_line(&mut line)
                    .await
                    .map_err(|e| SubprocessError::Io(e.to_string()))?;
                if n == 0 {
                    break;
                }
                if line.trim_end() == SENTINEL {
                    break;
                }
                self.pending_output.lock().await.push_str(&line);
            }
            Ok::<(), SubprocessError>(())
        };

        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(SubprocessError::Cancelled),
            result = tokio::time::timeout(timeout, read_until_sentinel) => result,
        };

        match outcome {
            Ok(Ok(())) => {
                let mut pending = self.pending_output.lock().await;
                let stdout = std::mem::take(&mut *pending);
                let mut pending_stderr = self.pending_stderr.lock().await;
                let stderr = std::mem::take(&mut *pending_stderr);
                Ok(RunOutput {
                    stdout,
                    stderr,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                let pending = self.pending_output.lock().await.clone();
                let stderr = self.pending_stderr.lock().await.clone();
                Ok(RunOutput {
                    stdout: pending,
                    stderr,
                    timed_out: true,
                })
            }
        }
    }

    pub async fn close(&self) {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stderr_alongside_stdout() {
        let session = ShellSession::spawn(None).unwrap();
        let cancellation = CancellationToken::new();
        let out = session
            .run(
                "echo on-stdout; echo on-stderr >&2",
                Duration::from_secs(5),
                &cancellation,
            )
            .await
            .unwrap();
        assert!(out.stdout.contains("on-stdout"));
        // The stderr drainer races the sentinel-bounded stdout read; give it
        // a moment to catch up before asserting on it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let out2 = session
            .run("true", Duration::from_secs(5), &cancellation)
            .await
            .unwrap();
        assert!(out.stderr.contains("on-stderr") || out2.stderr.contains("on-stderr"));
        session.close().await;
    }
}
