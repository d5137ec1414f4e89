//! Converts function calls into structured results.

use crate::tools::registry::{Scope, ToolRegistry};
use crate::types::{FunctionCall, FunctionResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves function calls against one registry.
///
/// Failures never escape as errors: an unknown tool or a failing handler
/// becomes a [`FunctionResult::Error`] so the conversation keeps going.
#[derive(Debug)]
pub struct ToolDispatcher<S: Scope> {
    registry: Arc<ToolRegistry<S>>,
}

impl<S: Scope> Clone for ToolDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<S: Scope> ToolDispatcher<S> {
    pub fn new(registry: Arc<ToolRegistry<S>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry<S> {
        &self.registry
    }

    /// Execute a function call.
    pub async fn execute(&self, call: &FunctionCall) -> FunctionResult {
        let Ok(tool) = self.registry.get(&call.name) else {
            warn!("Unknown {} function requested: {}", S::NAME, call.name);
            return FunctionResult::Error(format!("unknown function: {}", call.name));
        };

        debug!("Dispatching {} tool '{}'", S::NAME, call.name);
        match tool.call(&call.args).await {
            Ok(output) => FunctionResult::Output(output),
            Err(e) => {
                warn!("Tool '{}' failed: {}", call.name, e);
                FunctionResult::Error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{external_registry, internal_registry};
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> FunctionCall {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => panic!("args must be an object"),
        };
        FunctionCall::new(name, args)
    }

    #[tokio::test]
    async fn echo_output() {
        let dispatcher = ToolDispatcher::new(Arc::new(internal_registry()));
        let result = dispatcher.execute(&call("echo", json!({"text": "hello"}))).await;
        assert_eq!(result, FunctionResult::Output("hello".into()));
    }

    #[tokio::test]
    async fn unknown_function_is_structured_error() {
        let dispatcher = ToolDispatcher::new(Arc::new(internal_registry()));
        let result = dispatcher.execute(&call("missing", json!({}))).await;
        assert_eq!(
            result,
            FunctionResult::Error("unknown function: missing".into())
        );
    }

    #[tokio::test]
    async fn handler_error_is_structured_error() {
        let dispatcher = ToolDispatcher::new(Arc::new(internal_registry()));
        let result = dispatcher.execute(&call("echo", json!({"text": 42}))).await;
        assert_eq!(
            result,
            FunctionResult::Error("text parameter is required and must be a string".into())
        );
    }

    #[tokio::test]
    async fn internal_dispatcher_cannot_reach_external_tools() {
        let dispatcher = ToolDispatcher::new(Arc::new(internal_registry()));
        let result = dispatcher.execute(&call("healthz", json!({}))).await;
        assert_eq!(result, FunctionResult::Error("unknown function: healthz".into()));

        let external = ToolDispatcher::new(Arc::new(external_registry()));
        let result = external.execute(&call("healthz", json!({}))).await;
        assert_eq!(result, FunctionResult::Output("OK".into()));
    }
}
