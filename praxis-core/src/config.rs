//! Framework configuration
//!
//! A `PraxisConfig` carries the tool fleet definition plus client-wide
//! defaults. It loads from `praxis.toml` with `PRAXIS_`-prefixed
//! environment overrides.

use crate::error::{PraxisError, Result};
use crate::tools::{ToolCategory, ToolConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level framework configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PraxisConfig {
    /// Tool fleet to register at startup
    #[serde(default)]
    pub tools: Vec<ToolConfig>,

    /// Defaults applied to protocol clients
    #[serde(default)]
    pub client: ClientDefaults,

    /// What the agent may do on its own
    #[serde(default)]
    pub capabilities: AgentCapabilityConfig,
}

/// Capability toggles governing autonomous tool use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilityConfig {
    /// Allow web-search tools
    #[serde(default = "default_true")]
    pub enable_web_search: bool,

    /// Allow MCP-backed tools
    #[serde(default = "default_true")]
    pub enable_mcp_tools: bool,

    /// Upper bound on tools invoked without human approval
    #[serde(default = "default_max_autonomous_tools")]
    pub max_autonomous_tools: u32,

    /// Categories the agent may use; empty means all
    #[serde(default)]
    pub allowed_categories: Vec<ToolCategory>,

    /// Domains tools must never contact
    #[serde(default)]
    pub blocked_domains: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_autonomous_tools() -> u32 {
    10
}

impl Default for AgentCapabilityConfig {
    fn default() -> Self {
        Self {
            enable_web_search: true,
            enable_mcp_tools: true,
            max_autonomous_tools: default_max_autonomous_tools(),
            allowed_categories: Vec::new(),
            blocked_domains: Vec::new(),
        }
    }
}

impl AgentCapabilityConfig {
    /// Whether tools of the category may be used
    pub fn category_allowed(&self, category: ToolCategory) -> bool {
        match category {
            ToolCategory::WebSearch if !self.enable_web_search => return false,
            ToolCategory::McpTools if !self.enable_mcp_tools => return false,
            _ => {}
        }
        self.allowed_categories.is_empty() || self.allowed_categories.contains(&category)
    }
}

/// Client-wide defaults, overridable per tool via metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDefaults {
    /// Dial timeout
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Heartbeat period
    #[serde(with = "humantime_serde", default = "default_heartbeat_interval")]
    pub heartbeat_interval: Duration,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl PraxisConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (praxis.toml or path from PRAXIS_CONFIG_PATH)
    /// 3. Environment variable overrides
    pub fn load() -> Result<Self> {
        use figment::{
            providers::{Env, Format, Toml},
            Figment,
        };

        let mut figment = Figment::new()
            .merge(Toml::file("praxis.toml"))
            .merge(Env::prefixed("PRAXIS_").split("_"));

        if let Ok(path) = std::env::var("PRAXIS_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: PraxisConfig = figment.extract().map_err(|e| {
            PraxisError::Configuration(format!("Failed to load configuration: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            providers::{Format, Toml},
            Figment,
        };

        let config: PraxisConfig = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                PraxisError::Configuration(format!("Failed to load configuration file: {e}"))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every tool definition and reject duplicate ids
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            tool.validate()?;
            if !seen.insert(tool.tool_id.as_str()) {
                return Err(PraxisError::Configuration(format!(
                    "duplicate tool id '{}'",
                    tool.tool_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::tools::ToolCategory;

    #[test]
    fn test_defaults() {
        let config = PraxisConfig::default();
        assert!(config.tools.is_empty());
        assert_eq!(config.client.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let tool = ToolConfig::new("a", "tool a", ToolCategory::Integration);
        let config = PraxisConfig {
            tools: vec![tool.clone(), tool],
            ..PraxisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_category_allowed() {
        let mut capabilities = AgentCapabilityConfig::default();
        assert!(capabilities.category_allowed(ToolCategory::McpTools));
        assert!(capabilities.category_allowed(ToolCategory::Erp));

        capabilities.enable_mcp_tools = false;
        assert!(!capabilities.category_allowed(ToolCategory::McpTools));

        capabilities.allowed_categories = vec![ToolCategory::Analytics];
        assert!(capabilities.category_allowed(ToolCategory::Analytics));
        assert!(!capabilities.category_allowed(ToolCategory::Erp));
    }

    #[test]
    fn test_from_toml() {
        use figment::{
            providers::{Format, Toml},
            Figment,
        };
        let toml = r#"
            [[tools]]
            tool_id = "mcp_main"
            tool_name = "primary mcp bridge"
            category = "MCP_TOOLS"
            capabilities = ["MCP_PROTOCOL"]
            timeout = "15s"

            [tools.metadata]
            mcp_server_url = "localhost:9100"

            [client]
            heartbeat_interval = "45s"
        "#;
        let config: PraxisConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].timeout, Duration::from_secs(15));
        assert_eq!(config.client.heartbeat_interval, Duration::from_secs(45));
        assert!(config.validate().is_ok());
    }
}
