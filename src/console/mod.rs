//! Line-oriented chat console.

pub mod app;
pub mod render;

pub use app::{App, Command};

use crate::agent::ConversationError;
use crate::mcp::McpError;
use crate::types::HealthReport;
use crate::vertex::ChatSession;

/// Results posted back to the UI loop by background tasks.
#[derive(Debug)]
pub enum AppEvent {
    /// Outcome of a periodic or manual health check.
    Health(HealthReport),

    /// A chat message finished. The session comes back with it, or `None`
    /// if no session could be started.
    ChatResponse {
        session: Option<ChatSession>,
        result: Result<String, ConversationError>,
    },

    /// Outcome of a `/reconnect`.
    Reconnected(Result<(), McpError>),
}
