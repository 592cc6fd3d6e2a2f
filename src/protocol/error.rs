//! Transport error classification (spec.md §4.6).

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NetworkTemporary,
    ConfigError,
    AuthError,
    ProtocolError,
    Unknown,
}

impl ErrorCategory {
    pub fn retryable(self) -> bool {
        matches!(self, ErrorCategory::NetworkTemporary | ErrorCategory::Unknown)
    }
}

#[derive(Debug, Error)]
#[error("{category:?}: {message}")]
pub struct TransportError {
    pub category: ErrorCategory,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let category = classify(&message);
        Self { category, message }
    }

    pub fn retryable(&self) -> bool {
        self.category.retryable()
    }
}

/// Message-substring classification (spec.md §4.6 "Error classification table").
fn classify(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    const NETWORK_TEMPORARY: &[&str] = &[
        "timed out",
        "timeout",
        "connection reset",
        "connection refused",
        "503",
        "rate limit",
        "broken pipe",
    ];
    const CONFIG_ERRORS: &[&str] = &["command not found", "no such file", "enoent"];
    const AUTH_ERRORS: &[&str] = &["unauthorized", "401", "403", "permission denied", "auth"];
    const PROTOCOL_ERRORS: &[&str] = &["malformed", "parse error", "invalid json", "protocol"];

    if NETWORK_TEMPORARY.iter().any(|p| lower.contains(p)) {
        ErrorCategory::NetworkTemporary
    } else if CONFIG_ERRORS.iter().any(|p| lower.contains(p)) {
        ErrorCategory::ConfigError
    } else if AUTH_ERRORS.iter().any(|p| lower.contains(p)) {
        ErrorCategory::AuthError
    } else if PROTOCOL_ERRORS.iter().any(|p| lower.contains(p)) {
        ErrorCategory::ProtocolError
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_network_temporary_and_retryable() {
        let e = TransportError::new("request timed out after 30s");
        assert_eq!(e.category, ErrorCategory::NetworkTemporary);
        assert!(e.retryable());
    }

    #[test]
    fn command_not_found_is_config_error_and_not_retryable() {
        let e = TransportError::new("sh: command not found: foo-mcp-server");
        assert_eq!(e.category, ErrorCategory::ConfigError);
        assert!(!e.retryable());
    }

    #[test]
    fn auth_failure_is_not_retryable() {
        let e = TransportError::new("401 Unauthorized");
        assert_eq!(e.category, ErrorCategory::AuthError);
        assert!(!e.retryable());
    }

    #[test]
    fn unknown_defaults_to_retryable() {
        let e = TransportError::new("something strange happened");
        assert_eq!(e.category, ErrorCategory::Unknown);
        assert!(e.retryable());
    }
}
