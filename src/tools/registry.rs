//! Name-keyed tool catalog, parameterized by trust scope.
//!
//! Two registries exist per process: [`Internal`] tools are only reachable
//! from the conversation loop, [`External`] tools only from the MCP server.
//! The scope is part of the type, so a registry of one scope can never be
//! handed to a component that expects the other.

use crate::tools::traits::{Tool, ToolDefinition, ToolError};
use crate::types::ToolArgs;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Trust scope marker for a [`ToolRegistry`].
pub trait Scope: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Tools callable by the model.
#[derive(Debug)]
pub enum Internal {}

/// Tools callable by remote MCP clients.
#[derive(Debug)]
pub enum External {}

impl Scope for Internal {
    const NAME: &'static str = "internal";
}

impl Scope for External {
    const NAME: &'static str = "external";
}

/// Name-keyed tool catalog. The last registration for a name wins.
pub struct ToolRegistry<S: Scope> {
    entries: HashMap<String, Tool>,
    _scope: PhantomData<fn() -> S>,
}

impl<S: Scope> Default for ToolRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scope> ToolRegistry<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            _scope: PhantomData,
        }
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Tool) {
        self.entries.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Result<&Tool, ToolError> {
        self.entries
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up a tool and run it. Handler errors are returned unchanged.
    pub async fn execute(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let tool = self.get(name)?;
        tool.call(args).await
    }

    /// Definitions of all registered tools, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .entries
            .values()
            .map(|t| t.definition.clone())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Scope> fmt::Debug for ToolRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("scope", &S::NAME)
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::traits::ToolHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixed(&'static str);

    #[async_trait]
    impl ToolHandler for Fixed {
        async fn call(&self, _args: &ToolArgs) -> Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolHandler for Failing {
        async fn call(&self, _args: &ToolArgs) -> Result<String, ToolError> {
            Err(ToolError::Execution("disk on fire".into()))
        }
    }

    fn tool(name: &str, handler: Arc<dyn ToolHandler>) -> Tool {
        Tool::new(
            ToolDefinition {
                name: name.into(),
                description: format!("{} tool", name),
                parameters: json!({"type": "object", "properties": {}}),
            },
            handler,
        )
    }

    #[test]
    fn get_returns_the_registered_handler() {
        let handler: Arc<dyn ToolHandler> = Arc::new(Fixed("a"));
        let mut registry = ToolRegistry::<Internal>::new();
        registry.register(tool("alpha", handler.clone()));

        let found = registry.get("alpha").unwrap();
        assert!(Arc::ptr_eq(&found.handler, &handler));
        assert!(registry.has("alpha"));
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = ToolRegistry::<External>::new();
        assert_eq!(
            registry.get("nope").unwrap_err(),
            ToolError::NotFound("nope".into())
        );
        assert!(!registry.has("nope"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = ToolRegistry::<Internal>::new();
        registry.register(tool("dup", Arc::new(Fixed("first"))));
        registry.register(tool("dup", Arc::new(Fixed("second"))));

        assert_eq!(registry.len(), 1);
        let out = registry.execute("dup", &ToolArgs::new()).await.unwrap();
        assert_eq!(out, "second");
    }

    #[tokio::test]
    async fn execute_propagates_handler_error() {
        let mut registry = ToolRegistry::<Internal>::new();
        registry.register(tool("bad", Arc::new(Failing)));

        let err = registry.execute("bad", &ToolArgs::new()).await.unwrap_err();
        assert_eq!(err, ToolError::Execution("disk on fire".into()));

        let err = registry.execute("ghost", &ToolArgs::new()).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("ghost".into()));
    }

    #[test]
    fn definitions_are_sorted() {
        let mut registry = ToolRegistry::<External>::new();
        registry.register(tool("zeta", Arc::new(Fixed("z"))));
        registry.register(tool("alpha", Arc::new(Fixed("a"))));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert!(format!("{:?}", registry).contains("external"));
    }
}
