//! Error types for the MCP client and their retry classification.

use rmcp::ServiceError;
use thiserror::Error;

/// Errors that can occur when talking to the MCP tool server.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("session terminated. need to re-initialize")]
    SessionTerminated,

    #[error("client not initialized")]
    NotInitialized,

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i32, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ServiceError> for McpError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::McpError(data) => McpError::Rpc {
                code: data.code.0,
                message: data.message.into_owned(),
            },
            // The client worker only stops once its session is unusable.
            ServiceError::TransportClosed => McpError::SessionTerminated,
            ServiceError::Timeout { .. } => McpError::Timeout,
            ServiceError::UnexpectedResponse => {
                McpError::Protocol("unexpected response type".into())
            }
            other => McpError::Transport(other.to_string()),
        }
    }
}

/// How a failure should be handled by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote session is gone; the handshake must be redone.
    SessionInvalid,
    /// Anything else. Reported, retried by the next scheduled check.
    Transient,
}

/// Message fragments servers and the transport use for an unusable session.
const SESSION_INVALID_MARKERS: &[&str] = &[
    "need to re-initialize",
    "invalid session id",
    "session not found",
    "session expired",
];

/// Classify a free-form transport error message.
///
/// Only used when no typed variant applies. Every known wording is listed in
/// [`SESSION_INVALID_MARKERS`] and covered by tests.
pub fn classify_transport_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if SESSION_INVALID_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::SessionInvalid
    } else {
        ErrorClass::Transient
    }
}

impl McpError {
    pub fn class(&self) -> ErrorClass {
        match self {
            McpError::SessionTerminated | McpError::NotInitialized => ErrorClass::SessionInvalid,
            McpError::Timeout => ErrorClass::Transient,
            McpError::Rpc { message, .. } => classify_transport_message(message),
            McpError::Handshake(message)
            | McpError::Transport(message)
            | McpError::Protocol(message) => classify_transport_message(message),
        }
    }

    pub fn is_session_invalid(&self) -> bool {
        self.class() == ErrorClass::SessionInvalid
    }
}
