//! Protocol Client (C7, spec.md §4.6): MCP server connection lifecycle.

mod client;
mod config;
mod error;
mod transport;

pub use client::{run_health_monitor, ConnectionState, ProtocolClient};
pub use config::{HealthCheckConfig, ReconnectPolicy, ServerConfig};
pub use error::{ErrorCategory, TransportError};
pub use transport::Connection;
