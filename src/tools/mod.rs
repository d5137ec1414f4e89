pub mod dispatcher;
pub mod registry;
pub mod traits;

pub use dispatcher::ToolDispatcher;
pub use registry::{External, Internal, Scope, ToolRegistry};
pub use traits::{Tool, ToolDefinition, ToolError, ToolHandler};

use crate::types::ToolArgs;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// ---------------------------------------------------------------------------
// Internal tools (model-driven only)
// ---------------------------------------------------------------------------

/// Build the registry of tools the model may call.
pub fn internal_registry() -> ToolRegistry<Internal> {
    let mut registry = ToolRegistry::new();
    registry.register(Tool::new(echo_definition(), Arc::new(EchoTool)));
    registry
}

fn echo_definition() -> ToolDefinition {
    ToolDefinition {
        name: "echo".into(),
        description: "Echo back the exact text provided. Used for testing.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to echo back"
                }
            },
            "required": ["text"]
        }),
    }
}

/// Echoes back the exact text provided.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let text = traits::required_str(args, "text")?;
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// External tools (reachable over MCP only)
// ---------------------------------------------------------------------------

/// Name of the tool the client calls to check server health.
pub const HEALTH_TOOL: &str = "healthz";

/// Build the registry of tools exposed by the MCP server.
pub fn external_registry() -> ToolRegistry<External> {
    let mut registry = ToolRegistry::new();
    registry.register(Tool::new(healthz_definition(), Arc::new(HealthzTool)));
    registry
}

fn healthz_definition() -> ToolDefinition {
    ToolDefinition {
        name: HEALTH_TOOL.into(),
        description: "Check the health status of the MCP server".into(),
        parameters: json!({
            "type": "object",
            "properties": {}
        }),
    }
}

/// Liveness check answered by the MCP server.
pub struct HealthzTool;

#[async_trait]
impl ToolHandler for HealthzTool {
    async fn call(&self, _args: &ToolArgs) -> Result<String, ToolError> {
        info!("Healthz check requested");
        Ok("OK".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn echo_returns_text() {
        let out = EchoTool.call(&args(json!({"text": "hi"}))).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn echo_requires_text() {
        let err = EchoTool.call(&args(json!({}))).await.unwrap_err();
        assert_eq!(
            err,
            ToolError::InvalidArgument("text parameter is required and must be a string".into())
        );
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        assert_eq!(HealthzTool.call(&ToolArgs::new()).await.unwrap(), "OK");
    }

    #[test]
    fn registries_are_disjoint() {
        let internal = internal_registry();
        let external = external_registry();

        assert!(internal.has("echo"));
        assert!(internal.get("healthz").is_err());
        assert!(external.has("healthz"));
        assert!(external.get("echo").is_err());
    }

    #[test]
    fn echo_schema_requires_text() {
        let defs = internal_registry().definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["required"], json!(["text"]));
        assert_eq!(defs[0].parameters["properties"]["text"]["type"], "string");
    }
}
