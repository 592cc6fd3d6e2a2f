//! Protocol Client state machine (C7, spec.md §4.6).
//!
//! Backoff-and-retry shape grounded on `agent/execution/llm_retry.rs`'s
//! `call_llm_with_retry`/`wait_with_cancellation`: a retry loop that sleeps
//! with exponential backoff, racing the sleep against a cancellation token.

use super::config::{HealthCheckConfig, ReconnectPolicy, ServerConfig};
use super::error::TransportError;
use super::transport::{connect, Connection};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

pub struct ProtocolClient {
    config: ServerConfig,
    reconnect_policy: ReconnectPolicy,
    health_check: HealthCheckConfig,
    state: RwLock<ConnectionState>,
    connection: AsyncMutex<Option<Connection>>,
    reconnect_attempts: AtomicU32,
}

impl ProtocolClient {
    pub fn new(config: ServerConfig, reconnect_policy: ReconnectPolicy, health_check: HealthCheckConfig) -> Self {
        Self {
            config,
            reconnect_policy,
            health_check,
            state: RwLock::new(ConnectionState::Disconnected),
            connection: AsyncMutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// `connect(max_retries, initial_delay)` (spec.md §4.6): attempts
    /// handshake, retrying non-retryable-classified failures up to
    /// `max_retries` with exponential backoff.
    #[instrument(skip(self, cancellation), fields(transport = self.config.transport_name()))]
    pub async fn connect(&self, cancellation: &CancellationToken) -> Result<(), TransportError> {
        *self.state.write() = ConnectionState::Connecting;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match connect(&self.config).await {
                Ok(conn) => {
                    *self.connection.lock().await = Some(conn);
                    *self.state.write() = ConnectionState::Connected;
                    self.reconnect_attempts.store(0, Ordering::SeqCst);
                    info!(attempt, "mcp server connected");
                    return Ok(());
                }
                Err(e) => {
                    if !e.retryable() || attempt >= self.reconnect_policy.max_retries {
                        *self.state.write() = ConnectionState::Error;
                        return Err(e);
                    }
                    let wait = (self.reconnect_policy.initial_delay * 2u32.pow(attempt - 1))
                        .min(self.reconnect_policy.max_delay);
                    warn!(attempt, ?wait, "handshake failed, retrying");
                    if wait_with_cancellation(wait, cancellation).await {
                        *self.state.write() = ConnectionState::Error;
                        return Err(TransportError::new("cancelled during connect backoff"));
                    }
                }
            }
        }
    }

    /// `call_tool(name, arguments)`: fails if not `Connected` or the name is
    /// not in the cached tool list.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        if self.state() != ConnectionState::Connected {
            return Err(TransportError::new(format!(
                "cannot call tool `{name}`: client is not connected"
            )));
        }
        let guard = self.connection.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| TransportError::new("no active connection"))?;
        if !conn.tools.iter().any(|t| t.name == name) {
            return Err(TransportError::new(format!(
                "tool `{name}` is not in the server's advertised tool list"
            )));
        }
        let result = conn.call_tool(name, arguments).await?;
        serde_json::to_value(result).map_err(|e| TransportError::new(e.to_string()))
    }

    pub async fn cached_tools(&self) -> Vec<rmcp::model::Tool> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.tools.clone())
            .unwrap_or_default()
    }

    /// Called when the connection is observed closed unexpectedly (server
    /// close / io error): reconnects with the same backoff policy, capped
    /// at `max_reconnect_attempts` (spec.md §4.6).
    pub async fn reconnect(&self, cancellation: &CancellationToken) -> Result<(), TransportError> {
        *self.state.write() = ConnectionState::Error;
        let attempts = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempts > self.reconnect_policy.max_reconnect_attempts {
            return Err(TransportError::new(
                "reconnect_failed: exhausted max_reconnect_attempts",
            ));
        }
        self.connect(cancellation).await
    }

    pub fn disconnect(&self) {
        *self.state.write() = ConnectionState::Disconnected;
    }

    pub fn health_check_config(&self) -> &HealthCheckConfig {
        &self.health_check
    }

    /// A single health ping: re-lists the server's tools. Cheap, and a
    /// natural choice since every transport already implements it.
    pub async fn ping(&self) -> bool {
        let mut guard = self.connection.lock().await;
        match guard.as_mut() {
            Some(conn) => conn.refresh_tools().await.is_ok(),
            None => false,
        }
    }
}

/// Runs the optional Health Monitor: pings on a schedule, forcing a
/// reconnect once consecutive failures exceed the threshold.
pub async fn run_health_monitor(client: Arc<ProtocolClient>, cancellation: CancellationToken) {
    let mut consecutive_failures = 0u32;
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => return,
            _ = tokio::time::sleep(client.health_check_config().interval) => {}
        }

        if client.state() != ConnectionState::Connected {
            continue;
        }

        if client.ping().await {
            consecutive_failures = 0;
        } else {
            consecutive_failures += 1;
            if consecutive_failures >= client.health_check_config().failure_threshold {
                warn!(consecutive_failures, "health checks failing, forcing reconnect");
                let _ = client.reconnect(&cancellation).await;
                consecutive_failures = 0;
            }
        }
    }
}

/// Wait for `duration`, cancellable — same shape as
/// `llm_retry.rs::wait_with_cancellation`.
async fn wait_with_cancellation(duration: std::time::Duration, cancellation: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancellation.cancelled() => true,
    }
}
