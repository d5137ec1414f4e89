//! Lifecycle of the single connection to the remote tool server.
//!
//! The [`ConnectionManager`] owns the only live handle. It runs the
//! initialize handshake, answers health checks, and replaces the handle
//! wholesale when the server reports that the session is gone:
//!
//! ```text
//! Uninitialized --start--> Initializing --ok--> Connected
//!                               |                  |  session invalid
//!                               +--err--> Failed   v
//!                                  ^         Reconnecting --ok--> Connected
//!                                  +------------------+--err
//! ```
//!
//! Transient check errors leave the state untouched. Nothing but an explicit
//! [`ConnectionManager::start`] leaves `Failed`.

use crate::mcp::client::{result_failed, result_text};
use crate::mcp::error::McpError;
use crate::tools::HEALTH_TOOL;
use crate::types::{ConnectionState, HealthReport, ToolArgs};
use async_trait::async_trait;
use rmcp::model::CallToolResult;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// A live, initialized link to a tool server.
#[async_trait]
pub trait ToolServerConnection: Send + Sync {
    /// Stable identity of this connection. Changes on every reconnect.
    fn id(&self) -> &str;

    async fn call_tool(&self, name: &str, args: ToolArgs) -> Result<CallToolResult, McpError>;

    /// Release server-side resources. Best effort.
    async fn close(&self) -> Result<(), McpError>;
}

/// Opens new connections, including the handshake.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ToolServerConnection>, McpError>;
}

type Handle = Option<Arc<dyn ToolServerConnection>>;

/// Owner of the tool-server connection.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    handle: Mutex<Handle>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            connector,
            handle: Mutex::new(None),
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Identity of the current connection, if any.
    pub async fn connection_id(&self) -> Option<String> {
        self.current().await.map(|c| c.id().to_string())
    }

    /// Establish (or re-establish) the connection.
    ///
    /// Any existing connection is released first. On failure the manager is
    /// left `Failed` with no connection and the error is returned.
    pub async fn start(&self) -> Result<(), McpError> {
        let mut handle = self.handle.lock().await;
        self.set_state(ConnectionState::Initializing);
        self.replace(&mut handle).await
    }

    /// Check the server.
    ///
    /// Returns `Ok(false)` without any I/O when there is no connection.
    /// A session-invalid failure triggers one reconnect and one more check;
    /// any other failure is returned as-is with the state unchanged.
    pub async fn health_check(&self) -> Result<bool, McpError> {
        let Some(conn) = self.current().await else {
            return Ok(false);
        };

        match ping(conn.as_ref()).await {
            Ok(healthy) => Ok(healthy),
            Err(e) if e.is_session_invalid() => {
                warn!("Tool server session invalid ({}), reconnecting", e);
                let Some(conn) = self.reconnect(conn.id()).await? else {
                    return Ok(false);
                };
                ping(conn.as_ref()).await
            }
            Err(e) => {
                debug!("Health check failed: {}", e);
                Err(e)
            }
        }
    }

    /// Run a health check and fold the outcome into a report.
    pub async fn report(&self) -> HealthReport {
        let (healthy, error) = match self.health_check().await {
            Ok(healthy) => (healthy, None),
            Err(e) => (false, Some(e.to_string())),
        };
        HealthReport {
            healthy,
            state: self.state(),
            error,
        }
    }

    /// Release the connection and return to `Uninitialized`.
    pub async fn shutdown(&self) {
        let mut handle = self.handle.lock().await;
        release(handle.take()).await;
        self.set_state(ConnectionState::Uninitialized);
        info!("Tool server connection shut down");
    }

    async fn current(&self) -> Handle {
        self.handle.lock().await.clone()
    }

    /// Swap out the connection identified by `stale_id`.
    ///
    /// If another caller already replaced it, the current handle is returned
    /// without reconnecting. `None` means there is no connection to use.
    async fn reconnect(&self, stale_id: &str) -> Result<Handle, McpError> {
        let mut handle = self.handle.lock().await;
        match handle.as_ref() {
            Some(current) if current.id() != stale_id => return Ok(Some(current.clone())),
            None => return Ok(None),
            Some(_) => {}
        }

        self.set_state(ConnectionState::Reconnecting);
        self.replace(&mut handle).await?;
        Ok(handle.clone())
    }

    /// Release the old handle and install a fresh one. Caller holds the lock.
    async fn replace(&self, handle: &mut Handle) -> Result<(), McpError> {
        release(handle.take()).await;

        match self.connector.connect().await {
            Ok(conn) => {
                info!("Tool server connection {} established", conn.id());
                *handle = Some(conn);
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                error!("Tool server handshake failed: {}", e);
                self.set_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("Connection state {} -> {}", prev, next);
        }
    }
}

async fn ping(conn: &dyn ToolServerConnection) -> Result<bool, McpError> {
    let result = conn.call_tool(HEALTH_TOOL, ToolArgs::new()).await?;
    let failed = result_failed(&result);
    if failed {
        debug!("Health check answered with error: {}", result_text(&result));
    }
    Ok(!failed)
}

async fn release(handle: Handle) {
    if let Some(conn) = handle {
        if let Err(e) = conn.close().await {
            debug!("Failed to close connection {}: {}", conn.id(), e);
        }
    }
}
