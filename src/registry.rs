//! Tool Registry (C8, spec.md §4.7).
//!
//! Grounded on `tools/registry.rs::ToolRegistry`, generalized to reject
//! duplicate registrations (invariant I1: "the registry rejects duplicates
//! by name") and to namespace lazily-registered non-builtin tools the way
//! spec.md §4.2 implies permission rules need to address them individually
//! (`server__toolName` for MCP servers, `plugin:toolName` for plugins).

use crate::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register a tool discovered from an MCP server under
    /// `server__toolName`, so permission rules can target one server's
    /// tools without ambiguity against another server exposing the same
    /// bare tool name.
    pub fn register_server_scoped(
        &mut self,
        server_name: &str,
        tool: Arc<dyn Tool>,
    ) -> Result<(), RegistryError> {
        let scoped_name = format!("{server_name}__{}", tool.name());
        if self.tools.contains_key(&scoped_name) {
            return Err(RegistryError::Duplicate(scoped_name));
        }
        self.tools.insert(scoped_name, tool);
        Ok(())
    }

    pub fn register_plugin_scoped(
        &mut self,
        plugin_name: &str,
        tool: Arc<dyn Tool>,
    ) -> Result<(), RegistryError> {
        let scoped_name = format!("plugin:{plugin_name}:{}", tool.name());
        if self.tools.contains_key(&scoped_name) {
            return Err(RegistryError::Duplicate(scoped_name));
        }
        self.tools.insert(scoped_name, tool);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<crate::tool::ToolDefinition> {
        self.tools.values().map(|t| t.definition().clone()).collect()
    }
}
