//! Chat session abstraction over the model backend.

use crate::tools::ToolDefinition;
use crate::types::{FunctionCall, FunctionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the model backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("model returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl BackendError {
    /// Whether the failure means the session must be replaced.
    pub fn is_session_error(&self) -> bool {
        is_session_message(&self.to_string())
    }
}

/// Heuristic for backend failures caused by an unusable session.
pub fn is_session_message(message: &str) -> bool {
    message.to_lowercase().contains("session")
}

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One part of a turn. Serializes to the backend's single-key part objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: FunctionResult,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn function_response(name: impl Into<String>, response: FunctionResult) -> Self {
        Self::FunctionResponse(FunctionResponse {
            name: name.into(),
            response,
        })
    }
}

/// A turn in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// The model's answer to one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub content: Content,
}

impl ModelResponse {
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            content: Content::model(parts),
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Function calls requested by the model, in order.
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Conversational context held for the backend.
///
/// Replaced wholesale when the backend reports it unusable.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub model: String,
    pub tools: Vec<ToolDefinition>,
    pub history: Vec<Content>,
    pub started_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(model: &str, tools: Vec<ToolDefinition>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            model: model.to_string(),
            tools,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Record a completed exchange.
    pub fn record(&mut self, user: Content, model: Content) {
        self.history.push(user);
        self.history.push(model);
    }
}

/// A chat-capable model backend with function calling.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a fresh session declaring the tool schema.
    async fn start_session(&self) -> Result<ChatSession, BackendError>;

    /// Send one user turn. History is only extended on success.
    async fn send(
        &self,
        session: &mut ChatSession,
        parts: Vec<Part>,
    ) -> Result<ModelResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_messages() {
        for msg in [
            "session expired",
            "Session not found",
            "backend returned 400: chat SESSION is closed",
        ] {
            assert!(is_session_message(msg), "{msg}");
        }
        for msg in ["request timed out", "backend returned 500: internal", ""] {
            assert!(!is_session_message(msg), "{msg}");
        }
    }

    #[test]
    fn api_error_with_session_body_is_session_error() {
        let err = BackendError::Api {
            status: 404,
            body: "session not found".into(),
        };
        assert!(err.is_session_error());
        assert!(!BackendError::Timeout.is_session_error());
    }

    #[test]
    fn parts_serialize_as_single_key_objects() {
        let text = serde_json::to_value(Part::text("hi")).unwrap();
        assert_eq!(text, json!({"text": "hi"}));

        let response = serde_json::to_value(Part::function_response(
            "echo",
            FunctionResult::Output("hello".into()),
        ))
        .unwrap();
        assert_eq!(
            response,
            json!({"functionResponse": {"name": "echo", "response": {"output": "hello"}}})
        );

        let content = serde_json::to_value(Content::user(vec![Part::text("x")])).unwrap();
        assert_eq!(content, json!({"role": "user", "parts": [{"text": "x"}]}));
    }

    #[test]
    fn response_accessors() {
        let response = ModelResponse::new(vec![
            Part::text("a"),
            Part::FunctionCall(FunctionCall::new("echo", Default::default())),
            Part::text("b"),
        ]);
        assert_eq!(response.text(), "ab");
        assert_eq!(response.function_calls().len(), 1);
    }
}
