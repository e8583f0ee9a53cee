//! Tool configuration types
//!
//! A `ToolConfig` is an immutable snapshot consumed at tool construction.
//! The registry may atomically replace the running tool instance with one
//! built from a new snapshot (see `ToolRegistry::update_config`).

use crate::error::{PraxisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Tool categories for organization and factory routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCategory {
    /// Email, chat, messaging
    Communication,
    /// Enterprise Resource Planning
    Erp,
    /// Customer Relationship Management
    Crm,
    /// Document Management System
    Dms,
    /// File and cloud storage
    Storage,
    /// Business intelligence and reporting
    Analytics,
    /// Process automation and ticketing
    Workflow,
    /// API gateways and middleware
    Integration,
    /// Authentication and authorization
    Security,
    /// System monitoring and alerting
    Monitoring,
    /// Web search and information retrieval
    WebSearch,
    /// Model Context Protocol tools
    McpTools,
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolCategory::Communication => "COMMUNICATION",
            ToolCategory::Erp => "ERP",
            ToolCategory::Crm => "CRM",
            ToolCategory::Dms => "DMS",
            ToolCategory::Storage => "STORAGE",
            ToolCategory::Analytics => "ANALYTICS",
            ToolCategory::Workflow => "WORKFLOW",
            ToolCategory::Integration => "INTEGRATION",
            ToolCategory::Security => "SECURITY",
            ToolCategory::Monitoring => "MONITORING",
            ToolCategory::WebSearch => "WEB_SEARCH",
            ToolCategory::McpTools => "MCP_TOOLS",
        };
        f.write_str(name)
    }
}

/// Operations a tool declares support for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCapability {
    /// Read/query data
    Read,
    /// Create/modify data
    Write,
    /// Remove data
    Delete,
    /// Run operations or commands
    Execute,
    /// Real-time event subscription
    Subscribe,
    /// Send notifications
    Notify,
    /// Search and indexing
    Search,
    /// Bulk operations
    BatchProcess,
    /// ACID transaction support
    Transactional,
    /// Web search and information retrieval
    WebSearch,
    /// Model Context Protocol support
    McpProtocol,
}

impl fmt::Display for ToolCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolCapability::Read => "READ",
            ToolCapability::Write => "WRITE",
            ToolCapability::Delete => "DELETE",
            ToolCapability::Execute => "EXECUTE",
            ToolCapability::Subscribe => "SUBSCRIBE",
            ToolCapability::Notify => "NOTIFY",
            ToolCapability::Search => "SEARCH",
            ToolCapability::BatchProcess => "BATCH_PROCESS",
            ToolCapability::Transactional => "TRANSACTIONAL",
            ToolCapability::WebSearch => "WEB_SEARCH",
            ToolCapability::McpProtocol => "MCP_PROTOCOL",
        };
        f.write_str(name)
    }
}

/// Authentication mechanism a tool uses against its backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    /// No authentication
    #[default]
    None,
    /// Username/password
    Basic,
    /// OAuth 2.0 flow
    Oauth2,
    /// API key
    ApiKey,
    /// JSON Web Tokens
    Jwt,
    /// Client certificates
    Certificate,
    /// Kerberos
    Kerberos,
    /// SAML assertions
    Saml,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthType::None => "NONE",
            AuthType::Basic => "BASIC",
            AuthType::Oauth2 => "OAUTH2",
            AuthType::ApiKey => "API_KEY",
            AuthType::Jwt => "JWT",
            AuthType::Certificate => "CERTIFICATE",
            AuthType::Kerberos => "KERBEROS",
            AuthType::Saml => "SAML",
        };
        f.write_str(name)
    }
}

/// Configuration snapshot for a single tool instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Unique identifier within a registry
    pub tool_id: String,

    /// Human-readable name, also used for factory routing
    pub tool_name: String,

    /// What the tool does
    #[serde(default)]
    pub description: String,

    /// Category for organization and factory routing
    pub category: ToolCategory,

    /// Declared capabilities
    #[serde(default)]
    pub capabilities: Vec<ToolCapability>,

    /// Authentication mechanism
    #[serde(default)]
    pub auth_type: AuthType,

    /// Per-operation timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for non-protocol failure paths
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Sliding-window admission limit (trailing 60 seconds)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Whether the tool is available for invocation
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form backend-specific settings (server address, auth token,
    /// heartbeat/read timeouts for protocol clients, ...)
    #[serde(default)]
    pub metadata: Value,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_rate_limit() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

impl ToolConfig {
    /// Create a config with required fields and defaults for the rest
    pub fn new(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        category: ToolCategory,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            tool_name: tool_name.into(),
            description: String::new(),
            category,
            capabilities: Vec::new(),
            auth_type: AuthType::None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            rate_limit_per_minute: default_rate_limit(),
            enabled: true,
            metadata: Value::Null,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a capability
    pub fn with_capability(mut self, capability: ToolCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Set the authentication mechanism
    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    /// Set the per-operation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the rate limit
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set backend-specific metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Read a string field out of the metadata object
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Read an integer field out of the metadata object
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    /// Validate the snapshot before constructing a tool from it
    pub fn validate(&self) -> Result<()> {
        if self.tool_id.trim().is_empty() {
            return Err(PraxisError::Configuration(
                "tool_id must not be empty".to_string(),
            ));
        }
        if self.tool_name.trim().is_empty() {
            return Err(PraxisError::Configuration(
                "tool_name must not be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(PraxisError::Configuration(format!(
                "tool '{}' has a non-positive timeout",
                self.tool_id
            )));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(PraxisError::Configuration(format!(
                "tool '{}' has a non-positive rate limit",
                self.tool_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ToolConfig::new("t1", "test tool", ToolCategory::Integration);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.rate_limit_per_minute, 60);
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let config = ToolConfig::new("", "test tool", ToolCategory::Integration);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ToolConfig::new("t1", "test tool", ToolCategory::Integration)
            .with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rate_limit() {
        let config =
            ToolConfig::new("t1", "test tool", ToolCategory::Integration).with_rate_limit(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enum_wire_names() {
        let json = serde_json::to_value(ToolCategory::McpTools).unwrap();
        assert_eq!(json, serde_json::json!("MCP_TOOLS"));

        let cap: ToolCapability = serde_json::from_value(serde_json::json!("BATCH_PROCESS")).unwrap();
        assert_eq!(cap, ToolCapability::BatchProcess);

        let auth: AuthType = serde_json::from_value(serde_json::json!("API_KEY")).unwrap();
        assert_eq!(auth, AuthType::ApiKey);
        assert_eq!(auth.to_string(), "API_KEY");
    }

    #[test]
    fn test_config_round_trip() {
        let config = ToolConfig::new("mcp_main", "primary mcp bridge", ToolCategory::McpTools)
            .with_capability(ToolCapability::McpProtocol)
            .with_auth_type(AuthType::Jwt)
            .with_metadata(serde_json::json!({ "mcp_server_url": "localhost:9100" }));

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ToolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tool_id, "mcp_main");
        assert_eq!(parsed.category, ToolCategory::McpTools);
        assert_eq!(parsed.metadata_str("mcp_server_url"), Some("localhost:9100"));
    }
}
