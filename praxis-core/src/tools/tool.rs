//! Tool trait and the shared per-tool state
//!
//! Tools are the primary way agents act on external systems. Each tool
//! owns a `ToolCore` carrying its config snapshot, metrics, and rate
//! limiter; the `Tool` trait adds the operation entry point and the
//! connection lifecycle.

use super::config::{ToolCapability, ToolCategory, ToolConfig};
use super::metrics::{ToolHealthStatus, ToolMetrics};
use super::rate_limit::RateLimiter;
use super::result::ToolResult;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared state every concrete tool embeds
pub struct ToolCore {
    config: ToolConfig,
    metrics: ToolMetrics,
    rate_limiter: RateLimiter,
    enabled: AtomicBool,
    authenticated: AtomicBool,
}

impl std::fmt::Debug for ToolCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCore")
            .field("tool_id", &self.config.tool_id)
            .field("category", &self.config.category)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl ToolCore {
    /// Build core state from a validated config snapshot
    pub fn new(config: ToolConfig) -> Result<Self> {
        config.validate()?;
        let enabled = config.enabled;
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        let metrics = ToolMetrics::new(config.tool_id.clone());
        Ok(Self {
            config,
            metrics,
            rate_limiter,
            enabled: AtomicBool::new(enabled),
            authenticated: AtomicBool::new(false),
        })
    }

    /// The config snapshot this tool was built from
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Per-tool metrics
    pub fn metrics(&self) -> &ToolMetrics {
        &self.metrics
    }

    /// Whether the tool is available for invocation
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip availability
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the backing connection is established
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Record connection readiness
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Admission check against the sliding window. A rejection bumps
    /// `rate_limit_hits` and must short-circuit before any backend contact.
    pub fn check_rate_limit(&self) -> bool {
        if self.rate_limiter.try_acquire() {
            true
        } else {
            self.metrics.record_rate_limit_hit();
            false
        }
    }

    /// Record one executed operation outcome (exactly once per call)
    pub fn record_operation(&self, result: &ToolResult) {
        self.metrics.record(result);
    }

    /// Diagnostic snapshot combining metrics and connection state
    pub fn health_details(&self) -> Value {
        let mut details = self.metrics.snapshot_json();
        if let Value::Object(ref mut map) = details {
            map.insert("authenticated".to_string(), json!(self.is_authenticated()));
            map.insert("enabled".to_string(), json!(self.is_enabled()));
        }
        details
    }

    /// Static description of the tool for catalog export
    pub fn tool_info(&self) -> Value {
        let capabilities: Vec<String> = self
            .config
            .capabilities
            .iter()
            .map(ToString::to_string)
            .collect();
        json!({
            "tool_id": self.config.tool_id,
            "tool_name": self.config.tool_name,
            "description": self.config.description,
            "category": self.config.category.to_string(),
            "capabilities": capabilities,
            "auth_type": self.config.auth_type.to_string(),
            "timeout_seconds": self.config.timeout.as_secs(),
            "max_retries": self.config.max_retries,
            "rate_limit_per_minute": self.config.rate_limit_per_minute,
            "enabled": self.is_enabled(),
            "metadata": self.config.metadata,
        })
    }
}

/// Capability contract every concrete tool implements
///
/// `execute_operation` must never let an internal fault escape: all
/// failures become `ToolResult { success: false, .. }`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Shared per-tool state
    fn core(&self) -> &ToolCore;

    /// Invoke one named operation. The only entry point for callers.
    async fn execute_operation(&self, operation: &str, params: Value) -> ToolResult;

    /// Establish or validate readiness. Idempotent.
    async fn authenticate(&self) -> bool;

    /// Release all resources and reset authenticated state. Safe to call
    /// multiple times.
    async fn disconnect(&self) -> bool;

    /// Unique id within a registry
    fn tool_id(&self) -> &str {
        &self.core().config().tool_id
    }

    /// Human-readable name
    fn tool_name(&self) -> &str {
        &self.core().config().tool_name
    }

    /// Category for grouping and factory routing
    fn category(&self) -> ToolCategory {
        self.core().config().category
    }

    /// Whether the tool declares the capability
    fn supports_capability(&self, capability: ToolCapability) -> bool {
        self.core().config().capabilities.contains(&capability)
    }

    /// Whether the tool is available for invocation
    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Flip availability
    fn set_enabled(&self, enabled: bool) {
        self.core().set_enabled(enabled);
    }

    /// Whether the backing connection is established
    fn is_authenticated(&self) -> bool {
        self.core().is_authenticated()
    }

    /// Current health status
    fn health_status(&self) -> ToolHealthStatus {
        self.core().metrics().health_status()
    }

    /// JSON diagnostic snapshot
    fn health_details(&self) -> Value {
        self.core().health_details()
    }

    /// JSON catalog entry
    fn tool_info(&self) -> Value {
        self.core().tool_info()
    }

    /// Validate the config this tool was built from
    fn validate_config(&self) -> Result<()> {
        self.core().config().validate()
    }
}

/// Type alias for shared tool handles
pub type BoxedTool = Arc<dyn Tool>;

#[cfg(test)]
mod tool_tests {
    use super::*;
    use std::time::Duration;

    /// Minimal tool that echoes its parameters
    pub(crate) struct EchoTool {
        core: ToolCore,
    }

    impl EchoTool {
        pub(crate) fn new(config: ToolConfig) -> Self {
            Self {
                core: ToolCore::new(config).expect("valid config"),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn core(&self) -> &ToolCore {
            &self.core
        }

        async fn execute_operation(&self, operation: &str, params: Value) -> ToolResult {
            if !self.core.check_rate_limit() {
                return ToolResult::fail("Rate limit exceeded", Duration::ZERO);
            }
            let result = match operation {
                "echo" => ToolResult::ok(params, Duration::from_millis(1)),
                other => ToolResult::fail(
                    format!("Unknown operation: {other}"),
                    Duration::from_millis(1),
                ),
            };
            self.core.record_operation(&result);
            result
        }

        async fn authenticate(&self) -> bool {
            self.core.set_authenticated(true);
            true
        }

        async fn disconnect(&self) -> bool {
            self.core.set_authenticated(false);
            true
        }
    }

    fn echo_config() -> ToolConfig {
        ToolConfig::new("echo", "echo tool", ToolCategory::Integration)
            .with_capability(ToolCapability::Execute)
    }

    #[tokio::test]
    async fn test_execute_records_metrics_once() {
        let tool = EchoTool::new(echo_config());
        let result = tool
            .execute_operation("echo", serde_json::json!({"v": 1}))
            .await;
        assert!(result.success);
        assert_eq!(tool.core().metrics().operations_total(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_a_failure_result() {
        let tool = EchoTool::new(echo_config());
        let result = tool.execute_operation("nope", Value::Null).await;
        assert!(!result.success);
        assert!(result.error_message.contains("Unknown operation"));
    }

    #[test]
    fn test_supports_capability() {
        let tool = EchoTool::new(echo_config());
        assert!(tool.supports_capability(ToolCapability::Execute));
        assert!(!tool.supports_capability(ToolCapability::Write));
    }

    #[test]
    fn test_tool_info_shape() {
        let tool = EchoTool::new(echo_config());
        let info = tool.tool_info();
        assert_eq!(info["tool_id"], "echo");
        assert_eq!(info["category"], "INTEGRATION");
        assert_eq!(info["capabilities"][0], "EXECUTE");
    }

    #[test]
    fn test_health_details_include_connection_state() {
        let tool = EchoTool::new(echo_config());
        let details = tool.health_details();
        assert_eq!(details["authenticated"], false);
        assert_eq!(details["enabled"], true);
    }

    #[tokio::test]
    async fn test_rate_limit_rejection_counts_separately() {
        let config = echo_config().with_rate_limit(1);
        let tool = EchoTool::new(config);

        let first = tool.execute_operation("echo", Value::Null).await;
        assert!(first.success);
        let second = tool.execute_operation("echo", Value::Null).await;
        assert!(!second.success);

        let metrics = tool.core().metrics();
        assert_eq!(metrics.operations_total(), 1);
        assert_eq!(metrics.rate_limit_hits(), 1);
    }
}
