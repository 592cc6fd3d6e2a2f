//! Transport variants: stdio, sse, streamable http (spec.md §4.6).
//!
//! Each variant differs only in byte carrier; all three expose the same
//! `rmcp::service::RunningService`/`ServerSink` surface to the client state
//! machine, mirroring `agent/protocol.rs::start_mcp_server`'s match over
//! `McpServer::{Stdio, Http}` (generalized here to add the `sse` case the
//! teacher's agent layer didn't need).

use super::config::ServerConfig;
use super::error::TransportError;
use rmcp::model::{CallToolRequestParam, Tool as RmcpTool};
use rmcp::service::{serve_client, RoleClient, RunningService, ServerSink};
use rmcp::ClientHandler;
use std::sync::Arc;

/// Minimal no-op client identity/handler, analogous to the teacher's
/// `McpClientHandler` but without the elicitation/event-sink plumbing this
/// crate's Consent Gate already owns.
#[derive(Clone, Default)]
pub struct CoreClientHandler;

impl ClientHandler for CoreClientHandler {}

/// A live connection to one configured server: its transport plus the
/// discovered tool list, cached.
pub struct Connection {
    service: RunningService<RoleClient, CoreClientHandler>,
    pub tools: Vec<RmcpTool>,
}

impl Connection {
    pub fn peer(&self) -> ServerSink {
        self.service.peer().clone()
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<rmcp::model::CallToolResult, TransportError> {
        let args = match arguments {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(TransportError::new(format!(
                    "malformed arguments for tool `{name}`: expected an object, got {other}"
                )))
            }
        };
        self.peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args,
            })
            .await
            .map_err(|e| TransportError::new(e.to_string()))
    }

    pub async fn refresh_tools(&mut self) -> Result<(), TransportError> {
        self.tools = self
            .peer()
            .list_all_tools()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(())
    }
}

/// Perform the handshake for `config`, returning a connected `Connection`
/// with its tool list populated.
pub async fn connect(config: &ServerConfig) -> Result<Connection, TransportError> {
    let service = match config {
        ServerConfig::Stdio { command, args, env } => {
            let mut cmd = tokio::process::Command::new(command);
            cmd.args(args)
                .envs(env.iter())
                .stdout(std::process::Stdio::piped())
                .stdin(std::process::Stdio::piped())
                .stderr(std::process::Stdio::inherit());
            let transport = rmcp::transport::child_process::TokioChildProcess::new(cmd)
                .map_err(|e| TransportError::new(e.to_string()))?;
            serve_client(CoreClientHandler, transport)
                .await
                .map_err(|e| TransportError::new(e.to_string()))?
        }
        ServerConfig::Sse { url, .. } => {
            let transport = rmcp::transport::sse_client::SseClientTransport::start(url.clone())
                .await
                .map_err(|e| TransportError::new(e.to_string()))?;
            serve_client(CoreClientHandler, transport)
                .await
                .map_err(|e| TransportError::new(e.to_string()))?
        }
        ServerConfig::Http { url, headers } => {
            let mut header_map = reqwest::header::HeaderMap::new();
            for (k, v) in headers {
                if let (Ok(name), Ok(value)) = (
                    reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                    reqwest::header::HeaderValue::from_str(v),
                ) {
                    header_map.insert(name, value);
                }
            }
            let client = reqwest::ClientBuilder::new()
                .default_headers(header_map)
                .build()
                .map_err(|e| TransportError::new(e.to_string()))?;
            let transport = rmcp::transport::streamable_http_client::StreamableHttpClientTransport::with_client(
                client,
                rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig::with_uri(url.clone()),
            );
            serve_client(CoreClientHandler, transport)
                .await
                .map_err(|e| TransportError::new(e.to_string()))?
        }
    };

    let peer = service.peer().clone();
    let tools = peer
        .list_all_tools()
        .await
        .map_err(|e| TransportError::new(e.to_string()))?;

    Ok(Connection { service, tools })
}

pub type SharedConnection = Arc<tokio::sync::RwLock<Option<Connection>>>;
