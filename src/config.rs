//! Ambient TOML configuration for an embedder of this crate.
//!
//! Grounded on `agent/config.rs::load_config`'s shape (parse TOML ->
//! interpolate `${VAR}`/`${VAR:-default}` env refs -> deserialize ->
//! validate), trimmed to the sections this crate actually owns: the
//! permission policy's three rule lists, hook matchers (reusing
//! `hooks::HookConfig`'s own `Deserialize` impl directly), the snapshot
//! store, the subprocess/subagent concurrency caps, and named MCP server
//! connections.

use crate::hooks::HookConfig;
use crate::permissions::{PolicyConfig, RuleList};
use crate::protocol::{HealthCheckConfig, ReconnectPolicy, ServerConfig};
use crate::snapshot::SnapshotStoreConfig;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("environment variable `{0}` is required but not set")]
    MissingEnvVar(String),
}

fn default_true() -> bool {
    true
}

fn default_max_snapshots() -> usize {
    100
}

fn default_background_concurrency() -> u32 {
    8
}

fn default_subagent_concurrency() -> usize {
    5
}

fn default_subagent_ttl_secs() -> u64 {
    3600
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_health_check_interval_secs() -> u64 {
    30
}

fn default_health_check_failure_threshold() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PermissionPolicyConfig {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub ask: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub enable_checkpoints: bool,
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots_per_session: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            enable_checkpoints: true,
            max_snapshots_per_session: default_max_snapshots(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubprocessConfig {
    #[serde(default = "default_background_concurrency")]
    pub max_concurrent_background: u32,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            max_concurrent_background: default_background_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubagentConfig {
    #[serde(default = "default_subagent_concurrency")]
    pub max_concurrent: usize,
    #[serde(default = "default_subagent_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SubagentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_subagent_concurrency(),
            ttl_secs: default_subagent_ttl_secs(),
        }
    }
}

/// One `[[mcp]]` entry: a named server plus this crate's own
/// reconnect/health-check knobs layered on top of the wire transport
/// config from `protocol::ServerConfig`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerEntry {
    pub name: String,
    #[serde(flatten)]
    pub transport: ServerConfig,
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_health_check_failure_threshold")]
    pub health_check_failure_threshold: u32,
}

impl McpServerEntry {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_reconnect_attempts: self.reconnect_max_attempts,
            ..ReconnectPolicy::default()
        }
    }

    pub fn health_check_config(&self) -> HealthCheckConfig {
        HealthCheckConfig {
            interval: Duration::from_secs(self.health_check_interval_secs),
            failure_threshold: self.health_check_failure_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level config for an embedder: `[permissions]`, `[[hooks...]]`
/// (via `hooks::HookConfig`'s own field names), `[snapshot]`,
/// `[subprocess]`, `[subagent]`, `[[mcp]]`, `[logging]`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub workspace_root: Option<PathBuf>,
    pub permissions: PermissionPolicyConfig,
    pub hooks: HookConfig,
    pub snapshot: SnapshotConfig,
    pub subprocess: SubprocessConfig,
    pub subagent: SubagentConfig,
    pub mcp: Vec<McpServerEntry>,
    pub logging: LoggingConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw)?;
        Ok(toml::from_str(&interpolated)?)
    }

    /// Builds the `PolicyConfig` the Execution Pipeline (C9) consumes.
    /// Invalid rule syntax is surfaced as a parse failure at load time
    /// rather than deferred to the first mismatched invocation.
    pub fn policy_config(&self) -> Result<PolicyConfig, String> {
        Ok(PolicyConfig {
            allow: RuleList::parse(&self.permissions.allow).map_err(|e| e.to_string())?,
            ask: RuleList::parse(&self.permissions.ask).map_err(|e| e.to_string())?,
            deny: RuleList::parse(&self.permissions.deny).map_err(|e| e.to_string())?,
        })
    }

    pub fn snapshot_store_config(&self, default_root: impl Into<PathBuf>) -> SnapshotStoreConfig {
        SnapshotStoreConfig {
            root_dir: self.snapshot.root_dir.clone().unwrap_or_else(|| default_root.into()),
            enable_checkpoints: self.snapshot.enable_checkpoints,
            max_snapshots_per_session: self.snapshot.max_snapshots_per_session,
        }
    }
}

/// Supports `${VAR}` and `${VAR:-default}`, mirroring the teacher's own
/// `config.rs::interpolate_env_vars`.
fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("static regex is valid");
    let mut missing: Option<String> = None;

    let result = re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str());
        match (std::env::var(var_name), default) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::MissingEnvVar(var)),
        None => Ok(result.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_absent() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.subagent.max_concurrent, 5);
        assert_eq!(config.snapshot.max_snapshots_per_session, 100);
        assert!(config.mcp.is_empty());
    }

    #[test]
    fn parses_permission_rule_lists() {
        let toml = r#"
            [permissions]
            allow = ["Read", "Glob"]
            ask = ["Bash"]
            deny = ["Bash(rm -rf*)"]
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        let policy = config.policy_config().unwrap();
        assert!(policy.allow.first_match("Read", None).is_some());
        assert!(policy.deny.first_match("Bash", Some("rm -rf /")).is_some());
    }

    #[test]
    fn interpolates_env_vars_with_default() {
        unsafe {
            std::env::set_var("TOOLCORE_TEST_VAR", "my-root");
        }
        let toml = r#"workspace_root = "${TOOLCORE_TEST_VAR}""#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.workspace_root, Some(PathBuf::from("my-root")));
    }

    #[test]
    fn missing_required_env_var_is_an_error() {
        let toml = r#"workspace_root = "${TOOLCORE_DEFINITELY_UNSET}""#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn mcp_server_entry_parses_stdio_transport() {
        let toml = r#"
            [[mcp]]
            name = "github"
            transport = "stdio"
            command = "mcp-github"
            args = ["--stdio"]
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.mcp.len(), 1);
        assert_eq!(config.mcp[0].name, "github");
        assert_eq!(config.mcp[0].transport.transport_name(), "stdio");
    }
}
