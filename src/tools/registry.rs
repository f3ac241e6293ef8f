//! Tool registry.
//!
//! The [`ToolRegistry`] holds registered tools, provides lookup by
//! capability name, and exports JSON schemas for the conversation engine.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::Tool;

/// Registry of available tools keyed by capability name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Export JSON schemas for the given tools, or all tools when `only` is `None`.
    ///
    /// Each entry contains `name`, `description`, and `parameters` (the schema),
    /// sorted by name.
    pub fn schemas_for_api(&self, only: Option<&[String]>) -> Vec<serde_json::Value> {
        let mut schemas: Vec<(String, serde_json::Value)> = self
            .tools
            .values()
            .filter(|t| only.is_none_or(|names| names.iter().any(|n| n == t.name())))
            .map(|t| {
                let entry = serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.schema(),
                });
                (t.name().to_string(), entry)
            })
            .collect();
        schemas.sort_by(|a, b| a.0.cmp(&b.0));
        schemas.into_iter().map(|(_, v)| v).collect()
    }
}
