//! Protocol Server Config (spec.md §3 "Protocol Server Config").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ServerConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl ServerConfig {
    pub fn transport_name(&self) -> &'static str {
        match self {
            ServerConfig::Stdio { .. } => "stdio",
            ServerConfig::Sse { .. } => "sse",
            ServerConfig::Http { .. } => "http",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub initial_delay: std::time::Duration,
    /// Cap on auto-reconnect attempts after an unexpected close (spec.md
    /// §4.6: "capped, default 5 attempts").
    pub max_reconnect_attempts: u32,
    /// Ceiling on the exponential handshake backoff (invariant I6, spec.md
    /// §4.6: "capped at 30s").
    pub max_delay: std::time::Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: std::time::Duration::from_millis(500),
            max_reconnect_attempts: 5,
            max_delay: std::time::Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub interval: std::time::Duration,
    pub failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(30),
            failure_threshold: 3,
        }
    }
}
