//! Tracing init helper for embedders (spec.md §7 ambient logging).
//!
//! Grounded on `worker/src/main.rs`'s `tracing_subscriber::fmt()` setup —
//! `RUST_LOG` (or the config's own `logging.level`) drives an `EnvFilter`,
//! falling back to `info` when neither is set. No OTLP export layer: that
//! stack (`opentelemetry*`, `tracing-opentelemetry`) belongs to the
//! teacher's service binaries, not a library embedders link into their
//! own process.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber. Safe to call once per process;
/// a second call is a no-op (its `Err` is swallowed) since an embedder
/// may share this crate with another that already initialized tracing.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        tracing::debug!("tracing subscriber already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic_on_repeated_calls() {
        init(&LoggingConfig::default());
        init(&LoggingConfig::default());
    }
}
