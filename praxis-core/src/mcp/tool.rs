//! Tool facade over the MCP protocol client
//!
//! `McpTool` plugs a remote MCP server into the tool framework: rate
//! limiting and metrics come from `ToolCore`, the wire work from
//! `McpClient`. Connection settings ride in the tool config metadata.

use super::client::{ConnectionState, McpClient, McpClientConfig};
use super::transport::{Connector, TcpConnector};
use crate::error::{PraxisError, Result};
use crate::tools::{Tool, ToolConfig, ToolCore, ToolHealthStatus, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Metadata keys understood by [`McpTool`]
pub mod metadata_keys {
    /// Server address, `host:port` (required)
    pub const SERVER_URL: &str = "mcp_server_url";
    /// Bearer token forwarded during the handshake
    pub const AUTH_TOKEN: &str = "mcp_auth_token";
    /// Dial timeout in seconds
    pub const CONNECTION_TIMEOUT: &str = "mcp_connection_timeout";
    /// Per-request reply timeout in seconds
    pub const READ_TIMEOUT: &str = "mcp_read_timeout";
    /// Heartbeat period in seconds
    pub const HEARTBEAT_INTERVAL: &str = "mcp_heartbeat_interval";
    /// Protocol revisions to accept, newest first
    pub const SUPPORTED_PROTOCOLS: &str = "mcp_supported_protocols";
}

/// Tool backed by a remote MCP server
pub struct McpTool {
    core: ToolCore,
    client: McpClient,
    /// Set while health is forced OFFLINE so recovery can clear it
    /// without clobbering a MAINTENANCE override.
    offline_forced: AtomicBool,
}

impl fmt::Debug for McpTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpTool")
            .field("tool_id", &self.core.config().tool_id)
            .field("client", &self.client)
            .finish()
    }
}

impl McpTool {
    /// Build a tool dialing the server named in the config metadata
    pub fn from_config(config: ToolConfig) -> Result<Self> {
        let server_url = config
            .metadata_str(metadata_keys::SERVER_URL)
            .ok_or_else(|| {
                PraxisError::Configuration(format!(
                    "tool '{}' is missing metadata key '{}'",
                    config.tool_id,
                    metadata_keys::SERVER_URL
                ))
            })?
            .to_string();
        let connect_timeout = config
            .metadata_u64(metadata_keys::CONNECTION_TIMEOUT)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));
        let connector = Box::new(TcpConnector::new(server_url, connect_timeout));
        Self::with_connector(config, connector)
    }

    /// Build a tool over an arbitrary connector (used by tests)
    pub fn with_connector(config: ToolConfig, connector: Box<dyn Connector>) -> Result<Self> {
        let client_config = Self::client_config(&config);
        let core = ToolCore::new(config)?;
        Ok(Self {
            core,
            client: McpClient::new(connector, client_config),
            offline_forced: AtomicBool::new(false),
        })
    }

    fn client_config(config: &ToolConfig) -> McpClientConfig {
        let defaults = McpClientConfig::default();
        McpClientConfig {
            server_url: config
                .metadata_str(metadata_keys::SERVER_URL)
                .unwrap_or_default()
                .to_string(),
            client_name: config.tool_name.clone(),
            auth_token: config
                .metadata_str(metadata_keys::AUTH_TOKEN)
                .map(str::to_string),
            read_timeout: config
                .metadata_u64(metadata_keys::READ_TIMEOUT)
                .map(Duration::from_secs)
                .unwrap_or(config.timeout),
            reconnect_delay: config.retry_delay,
            heartbeat_interval: config
                .metadata_u64(metadata_keys::HEARTBEAT_INTERVAL)
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            supported_protocols: config
                .metadata
                .get(metadata_keys::SUPPORTED_PROTOCOLS)
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_else(|| defaults.supported_protocols.clone()),
            ..defaults
        }
    }

    /// The underlying protocol client
    pub fn client(&self) -> &McpClient {
        &self.client
    }

    /// Keep the forced OFFLINE override in step with the client state
    fn sync_offline_status(&self) {
        if self.client.state() == ConnectionState::Failed {
            if !self.offline_forced.swap(true, Ordering::SeqCst) {
                self.core
                    .metrics()
                    .force_status(Some(ToolHealthStatus::Offline));
            }
        } else if self.offline_forced.swap(false, Ordering::SeqCst) {
            self.core.metrics().force_status(None);
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.client.is_connected() {
            return Ok(());
        }
        if self.client.state() == ConnectionState::Failed {
            return Err(PraxisError::Connection(
                "reconnect attempts exhausted".to_string(),
            ));
        }
        self.client.connect().await
    }

    async fn dispatch(&self, operation: &str, params: Value) -> Result<Value> {
        match operation {
            "list_tools" => {
                let tools = self.client.refresh_tools().await?;
                Ok(json!({ "count": tools.len(), "tools": tools }))
            }
            "call_tool" => {
                let name = params
                    .get("tool_name")
                    .or_else(|| params.get("name"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        PraxisError::Configuration("call_tool requires 'tool_name'".to_string())
                    })?;
                if !self.client.tools().iter().any(|t| t.name == name) {
                    return Err(PraxisError::UnknownOperation(format!(
                        "tool '{name}' is not in the discovered catalog"
                    )));
                }
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                self.client.call_tool(name, arguments).await
            }
            "list_resources" => {
                let resources = self.client.refresh_resources().await?;
                Ok(json!({ "count": resources.len(), "resources": resources }))
            }
            "read_resource" => {
                let uri = Self::require_uri(&params, "read_resource")?;
                if !self.client.resources().iter().any(|r| r.uri == uri) {
                    return Err(PraxisError::UnknownOperation(format!(
                        "resource '{uri}' is not in the discovered catalog"
                    )));
                }
                let contents = self.client.read_resource(uri).await?;
                Ok(serde_json::to_value(contents)?)
            }
            "subscribe_resource" => {
                let uri = Self::require_uri(&params, "subscribe_resource")?;
                self.client.subscribe_resource(uri).await?;
                Ok(json!({ "subscribed": uri }))
            }
            other => Err(PraxisError::UnknownOperation(other.to_string())),
        }
    }

    fn require_uri<'a>(params: &'a Value, operation: &str) -> Result<&'a str> {
        params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            PraxisError::Configuration(format!("{operation} requires 'uri'"))
        })
    }
}

#[async_trait]
impl Tool for McpTool {
    fn core(&self) -> &ToolCore {
        &self.core
    }

    async fn execute_operation(&self, operation: &str, params: Value) -> ToolResult {
        if !self.core.is_enabled() {
            return ToolResult::fail("Tool is disabled", Duration::ZERO);
        }
        // Admission control runs before any network activity.
        if !self.core.check_rate_limit() {
            return ToolResult::fail("Rate limit exceeded", Duration::ZERO);
        }

        let started = Instant::now();
        let outcome = match self.ensure_connected().await {
            Ok(()) => self.dispatch(operation, params).await,
            Err(err) => Err(err),
        };
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(data) => ToolResult::ok(data, elapsed),
            Err(err) => {
                if matches!(err, PraxisError::Timeout(_)) {
                    self.core.metrics().record_timeout();
                }
                warn!(
                    tool_id = %self.core.config().tool_id,
                    operation = %operation,
                    error = %err,
                    "operation failed"
                );
                ToolResult::fail(err.to_string(), elapsed)
            }
        };
        self.core.record_operation(&result);
        self.sync_offline_status();
        result
    }

    async fn authenticate(&self) -> bool {
        let ok = self.ensure_connected().await.is_ok();
        self.core.set_authenticated(ok);
        self.sync_offline_status();
        ok
    }

    async fn disconnect(&self) -> bool {
        self.client.disconnect().await;
        self.core.set_authenticated(false);
        self.sync_offline_status();
        true
    }
}

#[cfg(test)]
mod mcp_tool_tests {
    use super::*;
    use crate::tools::{ToolCapability, ToolCategory};

    fn base_config() -> ToolConfig {
        ToolConfig::new("mcp1", "mcp bridge", ToolCategory::McpTools)
            .with_capability(ToolCapability::McpProtocol)
    }

    #[test]
    fn test_from_config_requires_server_url() {
        let err = McpTool::from_config(base_config()).unwrap_err();
        assert!(err.to_string().contains(metadata_keys::SERVER_URL));
    }

    #[test]
    fn test_debug_names_the_tool() {
        let config = base_config().with_metadata(json!({ "mcp_server_url": "localhost:9100" }));
        let tool = McpTool::from_config(config).unwrap();
        let rendered = format!("{tool:?}");
        assert!(rendered.contains("mcp1"));
        assert!(rendered.contains("DISCONNECTED") || rendered.contains("Disconnected"));
    }

    #[test]
    fn test_client_config_from_metadata() {
        let config = base_config().with_metadata(json!({
            "mcp_server_url": "localhost:9100",
            "mcp_auth_token": "secret",
            "mcp_read_timeout": 5,
            "mcp_heartbeat_interval": 7,
            "mcp_supported_protocols": ["2024-11-05", "2024-06-25"],
        }));
        let client_config = McpTool::client_config(&config);
        assert_eq!(client_config.server_url, "localhost:9100");
        assert_eq!(client_config.auth_token.as_deref(), Some("secret"));
        assert_eq!(client_config.read_timeout, Duration::from_secs(5));
        assert_eq!(client_config.heartbeat_interval, Duration::from_secs(7));
        assert_eq!(client_config.supported_protocols.len(), 2);
    }

    #[test]
    fn test_client_config_defaults_fall_back_to_tool_timeout() {
        let config = base_config().with_timeout(Duration::from_secs(12));
        let client_config = McpTool::client_config(&config);
        assert_eq!(client_config.read_timeout, Duration::from_secs(12));
        assert_eq!(client_config.client_name, "mcp bridge");
    }
}
