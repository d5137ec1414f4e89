//! Shared types used across the deepspec runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Connection state machine
// ---------------------------------------------------------------------------

/// Lifecycle states of the link to the remote tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No handshake attempted yet.
    Uninitialized,
    /// Handshake in flight.
    Initializing,
    /// Handshake completed, connection usable.
    Connected,
    /// Session was invalidated; old handle released, handshake in flight.
    Reconnecting,
    /// Last handshake failed. Only an explicit `start` leaves this state.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

// ---------------------------------------------------------------------------
// Function calling
// ---------------------------------------------------------------------------

/// Arguments passed to a tool handler.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Structured outcome of a function call, sent back to the model.
///
/// Serializes as `{"output": "..."}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionResult {
    Output(String),
    Error(String),
}

impl FunctionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The output or error text.
    pub fn text(&self) -> &str {
        match self {
            Self::Output(s) | Self::Error(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Health reporting
// ---------------------------------------------------------------------------

/// Result of one health check against the tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
    pub state: ConnectionState,
    pub error: Option<String>,
}
