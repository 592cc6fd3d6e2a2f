//! Subprocess Manager (C6, spec.md §4.5).

mod background;
mod ring;
mod session;

pub use background::{BackgroundProcessHandle, BackgroundProcessManager, ConsumeOutput, ProcessStatus};
pub use session::{RunOutput, ShellSession};

use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn process: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
    #[error("process `{0}` not found")]
    NotFound(String),
    #[error("concurrency limit reached: {hint}")]
    ConcurrentLimit { hint: String },
}

/// Ties persistent shell sessions (lazily created by id) and the background
/// process manager together behind one handle, as the pipeline sees them.
pub struct SubprocessManager {
    sessions: SyncMutex<HashMap<String, Arc<ShellSession>>>,
    pub background: Arc<BackgroundProcessManager>,
}

impl SubprocessManager {
    pub fn new(max_concurrent_background: u32) -> Self {
        Self {
            sessions: SyncMutex::new(HashMap::new()),
            background: Arc::new(BackgroundProcessManager::new(max_concurrent_background)),
        }
    }

    /// Get or lazily create the persistent shell session for `session_id`.
    pub fn session(
        &self,
        session_id: &str,
        cwd: Option<&std::path::Path>,
    ) -> Result<Arc<ShellSession>, SubprocessError> {
        if let Some(existing) = self.sessions.lock().get(session_id) {
            return Ok(existing.clone());
        }
        let session = Arc::new(ShellSession::spawn(cwd)?);
        self.sessions
            .lock()
            .insert(session_id.to_string(), session.clone());
        Ok(session)
    }

    pub async fn close_session(&self, session_id: &str) {
        let session = self.sessions.lock().remove(session_id);
        if let Some(session) = session {
            session.close().await;
        }
    }
}
