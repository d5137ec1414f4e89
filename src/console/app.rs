//! Console event loop.
//!
//! A single task owns all UI state and selects over stdin lines, the event
//! queue fed by background tasks, and Ctrl-C. Backend calls and handshakes
//! never run on this task.

use crate::agent::{ConversationError, ConversationLoop};
use crate::console::{render, AppEvent};
use crate::heartbeat::HealthMonitor;
use crate::mcp::ConnectionManager;
use crate::vertex::{BackendError, ChatSession};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const BACKEND_UNAVAILABLE: &str = "Vertex AI client not initialized";

/// A slash command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Reconnect,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse a line starting with `/`. Other lines are not commands.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }
        let cmd = match line {
            "/?" | "/help" => Command::Help,
            "/reconnect" => Command::Reconnect,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        };
        Some(cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// UI state for one console run.
pub struct App {
    manager: Arc<ConnectionManager>,
    conversation: Option<ConversationLoop>,
    session: Option<ChatSession>,
    pending: bool,
    online: Option<bool>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        manager: Arc<ConnectionManager>,
        conversation: Option<ConversationLoop>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            manager,
            conversation,
            session: None,
            pending: false,
            online: None,
            events,
        }
    }

    /// Run the console until `/quit`, EOF or Ctrl-C, then shut down the
    /// tool server connection.
    pub async fn run(
        manager: Arc<ConnectionManager>,
        conversation: Result<ConversationLoop, BackendError>,
        health_interval: Duration,
    ) -> Result<()> {
        let conversation = match conversation {
            Ok(conversation) => Some(conversation),
            Err(e) => {
                warn!("Backend unavailable: {e}");
                render::error(&format!("Vertex AI Error: {e}"));
                None
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let monitor = HealthMonitor::new(manager.clone(), health_interval, tx.clone());
        let monitor = tokio::spawn(monitor.run(cancel.clone()));

        let mut app = App::new(manager.clone(), conversation, tx);
        app.start_session().await;
        app.connect();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if app.handle_input(&line) == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {e}");
                        break;
                    }
                },
                Some(event) = rx.recv() => app.handle_event(event),
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        cancel.cancel();
        let _ = monitor.await;
        manager.shutdown().await;
        Ok(())
    }

    async fn start_session(&mut self) {
        let Some(conversation) = &self.conversation else {
            return;
        };
        match conversation.start_session().await {
            Ok(session) => {
                info!("Chat session {} started", session.id);
                self.session = Some(session);
            }
            Err(e) => render::error(&format!("Vertex AI Error: {e}")),
        }
    }

    /// Kick off the initial handshake in the background.
    fn connect(&self) {
        self.spawn_reconnect();
    }

    fn handle_input(&mut self, line: &str) -> Flow {
        let text = line.trim();
        if text.is_empty() {
            return Flow::Continue;
        }

        if let Some(command) = Command::parse(text) {
            match command {
                Command::Help => render::help(),
                Command::Reconnect => {
                    render::info("Reconnecting to MCP server…");
                    self.spawn_reconnect();
                }
                Command::Quit => return Flow::Quit,
                Command::Unknown(_) => render::error("Unknown command. Type '/?' for help."),
            }
            return Flow::Continue;
        }

        if self.pending {
            render::info("Still waiting for the previous response.");
            return Flow::Continue;
        }

        let Some(conversation) = self.conversation.clone() else {
            render::error(BACKEND_UNAVAILABLE);
            return Flow::Continue;
        };

        render::user_line(text);
        render::thinking();
        self.pending = true;

        let session = self.session.take();
        let text = text.to_string();
        let events = self.events.clone();
        tokio::spawn(async move {
            let (session, result) = match session {
                Some(session) => converse(&conversation, session, &text).await,
                None => match conversation.start_session().await {
                    Ok(session) => converse(&conversation, session, &text).await,
                    Err(e) => (None, Err(e)),
                },
            };
            let _ = events.send(AppEvent::ChatResponse { session, result });
        });

        Flow::Continue
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Health(report) => {
                if self.online != Some(report.healthy) {
                    render::status(report.healthy);
                    self.online = Some(report.healthy);
                }
            }
            AppEvent::ChatResponse { session, result } => {
                self.pending = false;
                if session.is_some() {
                    self.session = session;
                }
                match result {
                    Ok(text) => render::response(&text),
                    Err(e) => render::error(&format!("Error: {e}")),
                }
            }
            AppEvent::Reconnected(Ok(())) => info!("Tool server connection established"),
            AppEvent::Reconnected(Err(e)) => {
                render::error(&format!("MCP connection failed: {e}"));
            }
        }
    }

    /// Run the handshake, then report health so the indicator updates
    /// without waiting for the next check.
    fn spawn_reconnect(&self) {
        let manager = self.manager.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = manager.start().await;
            if events.send(AppEvent::Reconnected(result)).is_err() {
                return;
            }
            let _ = events.send(AppEvent::Health(manager.report().await));
        });
    }
}

async fn converse(
    conversation: &ConversationLoop,
    mut session: ChatSession,
    text: &str,
) -> (Option<ChatSession>, Result<String, ConversationError>) {
    let result = conversation.send_message(&mut session, text).await;
    (Some(session), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{Connector, McpError, ToolServerConnection};
    use crate::types::{ConnectionState, HealthReport};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Connector for Unreachable {
        async fn connect(&self) -> Result<Arc<dyn ToolServerConnection>, McpError> {
            Err(McpError::Transport("connection refused".into()))
        }
    }

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(ConnectionManager::new(Arc::new(Unreachable)));
        (App::new(manager, None, tx), rx)
    }

    fn report(healthy: bool) -> HealthReport {
        HealthReport {
            healthy,
            state: ConnectionState::Connected,
            error: None,
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/?"), Some(Command::Help));
        assert_eq!(Command::parse(" /reconnect "), Some(Command::Reconnect));
        assert_eq!(Command::parse("/quit"), Some(Command::Quit));
        assert_eq!(
            Command::parse("/frobnicate"),
            Some(Command::Unknown("/frobnicate".into()))
        );
        assert_eq!(Command::parse("hello /quit"), None);
    }

    #[tokio::test]
    async fn quit_and_blank_lines() {
        let (mut app, _rx) = app();
        assert_eq!(app.handle_input("   "), Flow::Continue);
        assert_eq!(app.handle_input("/quit"), Flow::Quit);
    }

    #[tokio::test]
    async fn message_without_backend_is_not_sent() {
        let (mut app, _rx) = app();
        assert_eq!(app.handle_input("echo hello"), Flow::Continue);
        assert!(!app.pending);
    }

    #[tokio::test]
    async fn status_tracks_health_flips() {
        let (mut app, _rx) = app();
        assert_eq!(app.online, None);

        app.handle_event(AppEvent::Health(report(false)));
        assert_eq!(app.online, Some(false));

        app.handle_event(AppEvent::Health(report(true)));
        assert_eq!(app.online, Some(true));
    }

    #[tokio::test]
    async fn chat_response_clears_pending_and_returns_session() {
        let (mut app, _rx) = app();
        app.pending = true;

        let session = ChatSession::new("test", Vec::new());
        let id = session.id.clone();
        app.handle_event(AppEvent::ChatResponse {
            session: Some(session),
            result: Err(ConversationError::Backend(BackendError::Timeout)),
        });

        assert!(!app.pending);
        assert_eq!(app.session.as_ref().map(|s| s.id.as_str()), Some(id.as_str()));
    }

    #[tokio::test]
    async fn reconnect_posts_result_then_health() {
        let (app, mut rx) = app();
        app.spawn_reconnect();

        assert!(matches!(rx.recv().await, Some(AppEvent::Reconnected(Err(_)))));
        match rx.recv().await {
            Some(AppEvent::Health(report)) => {
                assert!(!report.healthy);
                assert_eq!(report.state, ConnectionState::Failed);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
