//! Tool-calling conversation loop.
//!
//! One user message is submitted with the instruction preamble. While the
//! model answers with function calls, each call is dispatched against the
//! internal registry and all results go back in a single follow-up turn.
//! The loop ends on the first response without calls, or fails once
//! `max_tool_rounds` follow-ups have been spent.

use crate::agent::system_prompt;
use crate::tools::{Internal, ToolDispatcher};
use crate::vertex::{BackendError, ChatBackend, ChatSession, ModelResponse, Part};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("model kept requesting tools after {0} follow-up turns")]
    ToolLoopExceeded(usize),
}

/// Drives a chat session through tool calls to a final text answer.
#[derive(Clone)]
pub struct ConversationLoop {
    backend: Arc<dyn ChatBackend>,
    dispatcher: ToolDispatcher<Internal>,
    max_tool_rounds: usize,
}

impl ConversationLoop {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        dispatcher: ToolDispatcher<Internal>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            max_tool_rounds,
        }
    }

    pub async fn start_session(&self) -> Result<ChatSession, ConversationError> {
        Ok(self.backend.start_session().await?)
    }

    /// Send one user message and return the model's final text.
    ///
    /// A session-related failure on the first submission replaces `session`
    /// and resubmits once. Failures on follow-up turns are returned as-is.
    /// On any error the history is rolled back to where this message began,
    /// so the session never keeps a function call without its response.
    pub async fn send_message(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<String, ConversationError> {
        let entry_id = session.id.clone();
        let entry_len = session.history.len();

        let result = self.exchange(session, text).await;
        if result.is_err() {
            // A session started during this exchange holds only this message.
            let keep = if session.id == entry_id { entry_len } else { 0 };
            if session.history.len() > keep {
                debug!(
                    "Rolling back {} turn(s) of session {}",
                    session.history.len() - keep,
                    session.id
                );
                session.history.truncate(keep);
            }
        }
        result
    }

    async fn exchange(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<String, ConversationError> {
        let parts = vec![Part::text(system_prompt::with_preamble(text))];

        let mut response = match self.backend.send(session, parts.clone()).await {
            Ok(response) => response,
            Err(e) if e.is_session_error() => {
                warn!(
                    "Chat session {} (started {}) unusable ({e}), starting a new one",
                    session.id,
                    session.started_at.format("%H:%M:%S")
                );
                *session = self.backend.start_session().await?;
                self.backend.send(session, parts).await?
            }
            Err(e) => return Err(e.into()),
        };

        let mut rounds = 0;
        loop {
            let calls = response.function_calls();
            if calls.is_empty() {
                return Ok(response.text());
            }
            if rounds == self.max_tool_rounds {
                warn!("Giving up after {rounds} tool rounds");
                return Err(ConversationError::ToolLoopExceeded(self.max_tool_rounds));
            }
            rounds += 1;

            info!("Model requested {} function call(s)", calls.len());
            response = self.follow_up(session, &response).await?;
        }
    }

    /// Dispatch every call in `response` and submit the results together.
    async fn follow_up(
        &self,
        session: &mut ChatSession,
        response: &ModelResponse,
    ) -> Result<ModelResponse, BackendError> {
        let mut results = Vec::new();
        for call in response.function_calls() {
            let result = self.dispatcher.execute(&call).await;
            debug!("{} -> {:?}", call.name, result);
            results.push(Part::function_response(call.name, result));
        }
        self.backend.send(session, results).await
    }
}
