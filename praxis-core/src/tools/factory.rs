//! Construction of tools from configuration
//!
//! The factory is a registry of constructors: each route pairs a category
//! with a name matcher and a constructor closure. `create` is total; it
//! never panics and reports a missing route or a failed constructor as
//! `None` after logging.

use super::config::{ToolCategory, ToolConfig};
use super::tool::BoxedTool;
use crate::error::Result;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Case-insensitive substring matcher over tool names
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Matches every name
    Any,
    /// Matches names containing any of the fragments (case-insensitive)
    Contains(Vec<String>),
}

impl NameMatcher {
    /// Matcher accepting every tool name
    pub fn any() -> Self {
        NameMatcher::Any
    }

    /// Matcher accepting names containing any of the given fragments
    pub fn contains<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameMatcher::Contains(
            fragments
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        )
    }

    /// Whether the matcher accepts the name
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Any => true,
            NameMatcher::Contains(fragments) => {
                let name = name.to_lowercase();
                fragments.iter().any(|f| name.contains(f.as_str()))
            }
        }
    }
}

/// Constructor closure registered for a route
pub type ToolConstructor = Box<dyn Fn(ToolConfig) -> Result<BoxedTool> + Send + Sync>;

/// Registry of tool constructors keyed by category and name
#[derive(Default)]
pub struct ToolFactory {
    routes: HashMap<ToolCategory, Vec<(NameMatcher, ToolConstructor)>>,
}

impl std::fmt::Debug for ToolFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<(&ToolCategory, usize)> =
            self.routes.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("ToolFactory").field("routes", &routes).finish()
    }
}

impl ToolFactory {
    /// Empty factory with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory pre-wired with the built-in tool families
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register_route(
            ToolCategory::McpTools,
            NameMatcher::any(),
            Box::new(|config| {
                let tool = crate::mcp::McpTool::from_config(config)?;
                Ok(std::sync::Arc::new(tool) as BoxedTool)
            }),
        );
        factory
    }

    /// Register a constructor for a category/name route. Routes are
    /// consulted in registration order; the first match wins.
    pub fn register_route(
        &mut self,
        category: ToolCategory,
        matcher: NameMatcher,
        constructor: ToolConstructor,
    ) {
        self.routes
            .entry(category)
            .or_default()
            .push((matcher, constructor));
    }

    /// Build a tool for the config, or `None` when no route matches or
    /// the constructor fails.
    pub fn create(&self, config: ToolConfig) -> Option<BoxedTool> {
        let routes = match self.routes.get(&config.category) {
            Some(routes) => routes,
            None => {
                warn!(
                    tool_id = %config.tool_id,
                    category = %config.category,
                    "no factory route registered for category"
                );
                return None;
            }
        };

        for (matcher, constructor) in routes {
            if !matcher.matches(&config.tool_name) {
                continue;
            }
            let tool_id = config.tool_id.clone();
            match constructor(config) {
                Ok(tool) => {
                    debug!(tool_id = %tool_id, "constructed tool");
                    return Some(tool);
                }
                Err(err) => {
                    warn!(tool_id = %tool_id, error = %err, "tool constructor failed");
                    return None;
                }
            }
        }

        warn!(
            tool_id = %config.tool_id,
            tool_name = %config.tool_name,
            "no factory route matched tool name"
        );
        None
    }
}
