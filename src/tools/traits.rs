//! Tool handler trait and tool definitions.

use crate::types::ToolArgs;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Definition of a tool, advertised to the model or to remote callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// Errors raised by tool lookup or tool handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Execution(String),
}

/// A callable tool body.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given arguments.
    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError>;
}

/// A registered tool: its definition plus the handler that runs it.
#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        self.handler.call(args).await
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Read a required string argument.
pub fn required_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    args.get(key).and_then(|v| v.as_str()).ok_or_else(|| {
        ToolError::InvalidArgument(format!(
            "{} parameter is required and must be a string",
            key
        ))
    })
}
