//! Central tool registry
//!
//! The registry owns the set of live tools, routes lookups, aggregates
//! health across the fleet, and applies config updates by building the
//! replacement instance before swapping it in.

use super::config::{ToolCategory, ToolConfig};
use super::factory::ToolFactory;
use super::metrics::ToolHealthStatus;
use super::tool::BoxedTool;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Failures surfaced by registry mutations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A tool with the same id is already registered
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    /// No tool with the given id
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// The config snapshot failed validation
    #[error(transparent)]
    InvalidConfig(#[from] crate::error::PraxisError),

    /// The factory could not build a tool for the config
    #[error("factory could not build a tool for '{0}'")]
    BuildFailed(String),
}

impl From<RegistryError> for crate::error::PraxisError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidConfig(inner) => inner,
            other => crate::error::PraxisError::Other(other.to_string()),
        }
    }
}

/// Registry of live tool instances keyed by tool id
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, BoxedTool>>,
    factory: Arc<ToolFactory>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_ids())
            .finish()
    }
}

impl ToolRegistry {
    /// Registry backed by the given factory
    pub fn new(factory: Arc<ToolFactory>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Registry wired with the default factory routes
    pub fn with_default_factory() -> Self {
        Self::new(Arc::new(ToolFactory::with_defaults()))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, BoxedTool>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, BoxedTool>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an already-constructed tool. Rejects duplicate ids and
    /// invalid configs.
    pub fn register(&self, tool: BoxedTool) -> Result<(), RegistryError> {
        tool.validate_config()?;
        let id = tool.tool_id().to_string();
        let mut tools = self.write();
        if tools.contains_key(&id) {
            return Err(RegistryError::DuplicateTool(id));
        }
        info!(tool_id = %id, category = %tool.category(), "registered tool");
        tools.insert(id, tool);
        Ok(())
    }

    /// Build a tool for the config via the factory and register it
    pub fn register_from_config(&self, config: ToolConfig) -> Result<(), RegistryError> {
        let tool_id = config.tool_id.clone();
        let tool = self
            .factory
            .create(config)
            .ok_or(RegistryError::BuildFailed(tool_id))?;
        self.register(tool)
    }

    /// Remove a tool and disconnect it. The registry lock is released
    /// before the disconnect so callers of other tools are never blocked
    /// on the teardown.
    pub async fn unregister(&self, tool_id: &str) -> Result<(), RegistryError> {
        let tool = {
            let mut tools = self.write();
            tools
                .remove(tool_id)
                .ok_or_else(|| RegistryError::UnknownTool(tool_id.to_string()))?
        };
        tool.disconnect().await;
        info!(tool_id = %tool_id, "unregistered tool");
        Ok(())
    }

    /// Look up a tool by id
    pub fn get(&self, tool_id: &str) -> Option<BoxedTool> {
        self.read().get(tool_id).cloned()
    }

    /// Ids of all registered tools
    pub fn tool_ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Ids of currently enabled tools
    pub fn available_tools(&self) -> Vec<String> {
        self.read()
            .values()
            .filter(|t| t.is_enabled())
            .map(|t| t.tool_id().to_string())
            .collect()
    }

    /// Tools belonging to a category
    pub fn tools_by_category(&self, category: ToolCategory) -> Vec<BoxedTool> {
        self.read()
            .values()
            .filter(|t| t.category() == category)
            .cloned()
            .collect()
    }

    /// Enable a tool and clear any forced health override
    pub fn enable(&self, tool_id: &str) -> Result<(), RegistryError> {
        let tool = self
            .get(tool_id)
            .ok_or_else(|| RegistryError::UnknownTool(tool_id.to_string()))?;
        tool.set_enabled(true);
        tool.core().metrics().force_status(None);
        info!(tool_id = %tool_id, "enabled tool");
        Ok(())
    }

    /// Disable a tool; its health reports MAINTENANCE until re-enabled
    pub fn disable(&self, tool_id: &str) -> Result<(), RegistryError> {
        let tool = self
            .get(tool_id)
            .ok_or_else(|| RegistryError::UnknownTool(tool_id.to_string()))?;
        tool.set_enabled(false);
        tool.core()
            .metrics()
            .force_status(Some(ToolHealthStatus::Maintenance));
        info!(tool_id = %tool_id, "disabled tool");
        Ok(())
    }

    /// Enable every registered tool
    pub fn enable_all(&self) {
        for tool in self.read().values() {
            tool.set_enabled(true);
            tool.core().metrics().force_status(None);
        }
    }

    /// Disable every registered tool
    pub fn disable_all(&self) {
        for tool in self.read().values() {
            tool.set_enabled(false);
            tool.core()
                .metrics()
                .force_status(Some(ToolHealthStatus::Maintenance));
        }
    }

    /// Catalog of all tools for export
    pub fn catalog(&self) -> Value {
        let entries: Vec<Value> = self.read().values().map(|t| t.tool_info()).collect();
        json!({ "tools": entries, "count": entries.len() })
    }

    /// Detailed view of one tool (info plus health)
    pub fn tool_details(&self, tool_id: &str) -> Option<Value> {
        let tool = self.get(tool_id)?;
        Some(json!({
            "info": tool.tool_info(),
            "health": tool.health_details(),
        }))
    }

    /// Aggregate health over the fleet
    pub fn system_health(&self) -> Value {
        let tools = self.read();
        let mut by_status: HashMap<String, u64> = HashMap::new();
        let mut entries = Vec::new();
        for tool in tools.values() {
            let status = tool.health_status();
            *by_status.entry(status.to_string()).or_insert(0) += 1;
            entries.push(json!({
                "tool_id": tool.tool_id(),
                "status": status.to_string(),
            }));
        }
        let healthy = by_status
            .get(ToolHealthStatus::Healthy.to_string().as_str())
            .copied()
            .unwrap_or(0);
        json!({
            "total_tools": tools.len(),
            "healthy_tools": healthy,
            "by_status": by_status,
            "tools": entries,
        })
    }

    /// Ids of tools whose health is degraded or worse
    pub fn unhealthy_tools(&self) -> Vec<String> {
        self.read()
            .values()
            .filter(|t| {
                !matches!(
                    t.health_status(),
                    ToolHealthStatus::Healthy | ToolHealthStatus::Maintenance
                )
            })
            .map(|t| t.tool_id().to_string())
            .collect()
    }

    /// Replace a tool with one built from a new config snapshot.
    ///
    /// The replacement is constructed first; if the build fails the
    /// running instance stays registered untouched. On success the old
    /// instance is swapped out and disconnected.
    pub async fn update_config(&self, config: ToolConfig) -> Result<(), RegistryError> {
        config.validate()?;
        let tool_id = config.tool_id.clone();
        if self.get(&tool_id).is_none() {
            return Err(RegistryError::UnknownTool(tool_id));
        }

        let replacement = match self.factory.create(config) {
            Some(tool) => tool,
            None => {
                warn!(tool_id = %tool_id, "config update rejected, keeping previous instance");
                return Err(RegistryError::BuildFailed(tool_id));
            }
        };

        let previous = {
            let mut tools = self.write();
            tools.insert(tool_id.clone(), replacement)
        };
        if let Some(old) = previous {
            old.disconnect().await;
        }
        info!(tool_id = %tool_id, "applied config update");
        Ok(())
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use crate::error::PraxisError;
    use crate::tools::config::ToolCapability;
    use crate::tools::factory::NameMatcher;
    use crate::tools::result::ToolResult;
    use crate::tools::tool::{Tool, ToolCore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingTool {
        core: ToolCore,
        disconnects: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn core(&self) -> &ToolCore {
            &self.core
        }

        async fn execute_operation(&self, _operation: &str, _params: Value) -> ToolResult {
            let result = ToolResult::ok(Value::Null, Duration::from_millis(1));
            self.core.record_operation(&result);
            result
        }

        async fn authenticate(&self) -> bool {
            self.core.set_authenticated(true);
            true
        }

        async fn disconnect(&self) -> bool {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.core.set_authenticated(false);
            true
        }
    }

    fn counting_factory(disconnects: Arc<AtomicU32>) -> Arc<ToolFactory> {
        let mut factory = ToolFactory::new();
        factory.register_route(
            ToolCategory::Integration,
            NameMatcher::any(),
            Box::new(move |config| {
                if config.metadata_str("fail_build").is_some() {
                    return Err(PraxisError::Configuration("forced failure".to_string()));
                }
                Ok(Arc::new(CountingTool {
                    core: ToolCore::new(config)?,
                    disconnects: Arc::clone(&disconnects),
                }) as BoxedTool)
            }),
        );
        Arc::new(factory)
    }

    fn config(id: &str) -> ToolConfig {
        ToolConfig::new(id, format!("{id} tool"), ToolCategory::Integration)
            .with_capability(ToolCapability::Execute)
    }

    #[test]
    fn test_register_and_duplicate_rejection() {
        let registry = ToolRegistry::new(counting_factory(Arc::new(AtomicU32::new(0))));
        registry.register_from_config(config("a")).unwrap();
        let err = registry.register_from_config(config("a")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(_)));
        assert!(registry.get("a").is_some());
    }

    #[tokio::test]
    async fn test_unregister_disconnects() {
        let disconnects = Arc::new(AtomicU32::new(0));
        let registry = ToolRegistry::new(counting_factory(Arc::clone(&disconnects)));
        registry.register_from_config(config("a")).unwrap();

        registry.unregister("a").await.unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(registry.get("a").is_none());

        let err = registry.unregister("a").await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTool(_)));
    }

    #[test]
    fn test_available_excludes_disabled() {
        let registry = ToolRegistry::new(counting_factory(Arc::new(AtomicU32::new(0))));
        registry.register_from_config(config("a")).unwrap();
        registry.register_from_config(config("b")).unwrap();

        registry.disable("a").unwrap();
        let available = registry.available_tools();
        assert_eq!(available, vec!["b".to_string()]);
    }

    #[test]
    fn test_disable_forces_maintenance_and_enable_clears_it() {
        let registry = ToolRegistry::new(counting_factory(Arc::new(AtomicU32::new(0))));
        registry.register_from_config(config("a")).unwrap();

        registry.disable("a").unwrap();
        let tool = registry.get("a").unwrap();
        assert_eq!(tool.health_status(), ToolHealthStatus::Maintenance);

        registry.enable("a").unwrap();
        assert_eq!(tool.health_status(), ToolHealthStatus::Healthy);
        assert!(tool.is_enabled());
    }

    #[test]
    fn test_system_health_aggregates() {
        let registry = ToolRegistry::new(counting_factory(Arc::new(AtomicU32::new(0))));
        registry.register_from_config(config("a")).unwrap();
        registry.register_from_config(config("b")).unwrap();
        registry.disable("b").unwrap();

        let health = registry.system_health();
        assert_eq!(health["total_tools"], 2);
        assert_eq!(health["healthy_tools"], 1);
        assert_eq!(health["by_status"]["MAINTENANCE"], 1);
    }

    #[test]
    fn test_unhealthy_tools_reports_degraded_and_worse() {
        let registry = ToolRegistry::new(counting_factory(Arc::new(AtomicU32::new(0))));
        registry.register_from_config(config("a")).unwrap();
        registry.register_from_config(config("b")).unwrap();

        let tool = registry.get("a").unwrap();
        for _ in 0..3 {
            tool.core()
                .metrics()
                .record(&ToolResult::fail("x", Duration::from_millis(1)));
        }
        assert_eq!(registry.unhealthy_tools(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_update_config_swaps_and_disconnects_old() {
        let disconnects = Arc::new(AtomicU32::new(0));
        let registry = ToolRegistry::new(counting_factory(Arc::clone(&disconnects)));
        registry.register_from_config(config("a")).unwrap();

        let old = registry.get("a").unwrap();
        old.execute_operation("noop", Value::Null).await;
        assert_eq!(old.core().metrics().operations_total(), 1);

        let updated = config("a").with_rate_limit(5);
        registry.update_config(updated).await.unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);

        // Fresh instance, fresh metrics.
        let new = registry.get("a").unwrap();
        assert_eq!(new.core().metrics().operations_total(), 0);
        assert_eq!(new.core().config().rate_limit_per_minute, 5);
    }

    #[tokio::test]
    async fn test_update_config_rollback_keeps_old_instance() {
        let disconnects = Arc::new(AtomicU32::new(0));
        let registry = ToolRegistry::new(counting_factory(Arc::clone(&disconnects)));
        registry.register_from_config(config("a")).unwrap();
        let old = registry.get("a").unwrap();

        // metadata_str only matches string values
        let bad = config("a").with_metadata(json!({ "fail_build": "on" }));
        let err = registry.update_config(bad).await.unwrap_err();
        assert!(matches!(err, RegistryError::BuildFailed(_)));

        // Old instance still registered and never disconnected.
        let current = registry.get("a").unwrap();
        assert!(Arc::ptr_eq(&old, &current));
        assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_config_unknown_tool() {
        let registry = ToolRegistry::new(counting_factory(Arc::new(AtomicU32::new(0))));
        let err = registry.update_config(config("ghost")).await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTool(_)));
    }
}
