//! # Praxis - Tool Capability Framework for Autonomous Agents
//!
//! Praxis gives agents a uniform way to act on external systems:
//! - A `Tool` contract with per-tool rate limiting, metrics, and health
//! - A registry managing the live fleet with atomic config updates
//! - A factory building tools from declarative configuration
//! - A resilient Model Context Protocol (MCP) client with handshake,
//!   request correlation, heartbeats, and bounded reconnection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use praxis_core::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = ToolRegistry::with_default_factory();
//!
//!     let config = ToolConfig::new("mcp_main", "primary mcp bridge", ToolCategory::McpTools)
//!         .with_capability(ToolCapability::McpProtocol)
//!         .with_metadata(json!({ "mcp_server_url": "localhost:9100" }));
//!     registry.register_from_config(config)?;
//!
//!     if let Some(tool) = registry.get("mcp_main") {
//!         let result = tool.execute_operation("list_tools", json!({})).await;
//!         println!("{}", result.data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Every operation returns a `ToolResult`; faults never cross the tool
//! boundary as panics. Connection-level recovery lives entirely inside
//! the protocol client: callers see a failed result, not a retry loop.

pub mod config;
pub mod error;
pub mod mcp;
pub mod tools;

pub use config::{AgentCapabilityConfig, ClientDefaults, PraxisConfig};
pub use error::{PraxisError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::config::PraxisConfig;
    pub use crate::error::{PraxisError, Result};
    pub use crate::mcp::{
        ConnectionState, McpClient, McpClientConfig, McpTool, RemoteResource, RemoteTool,
    };
    pub use crate::tools::{
        AuthType, BoxedTool, MetricsSnapshot, Tool, ToolCapability, ToolCategory, ToolConfig,
        ToolFactory, ToolHealthStatus, ToolMetrics, ToolRegistry, ToolResult,
    };
}
