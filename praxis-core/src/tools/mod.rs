//! Tool capability framework
//!
//! Defines the `Tool` contract, per-tool configuration, metrics and
//! health derivation, sliding-window rate limiting, the constructor
//! factory, and the registry that holds the live fleet.

pub mod config;
pub mod factory;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod result;
pub mod tool;

pub use config::{AuthType, ToolCapability, ToolCategory, ToolConfig};
pub use factory::{NameMatcher, ToolConstructor, ToolFactory};
pub use metrics::{derive_health, MetricsSnapshot, ToolHealthStatus, ToolMetrics};
pub use rate_limit::{Clock, RateLimiter, SystemClock, RATE_LIMIT_WINDOW};
pub use registry::{RegistryError, ToolRegistry};
pub use result::ToolResult;
pub use tool::{BoxedTool, Tool, ToolCore};
