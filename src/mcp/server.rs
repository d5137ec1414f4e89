//! MCP server exposing the external tool registry over streamable HTTP.

use crate::tools::{External, ToolDefinition, ToolDispatcher, ToolRegistry};
use crate::types::{FunctionCall, FunctionResult};
use anyhow::{Context, Result};
use axum::Router;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation,
        ListToolsResult, PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    transport::streamable_http_server::{
        session::{
            local::{LocalSessionManager, SessionConfig},
            SessionManager,
        },
        StreamableHttpServerConfig, StreamableHttpService,
    },
    RoleServer, ServerHandler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "deepspec-server";
pub const SERVER_VERSION: &str = "1.0.0";

/// Answers `tools/list` and `tools/call` from the external registry.
#[derive(Clone)]
pub struct ToolServer {
    dispatcher: ToolDispatcher<External>,
}

impl ToolServer {
    pub fn new(registry: Arc<ToolRegistry<External>>) -> Self {
        Self {
            dispatcher: ToolDispatcher::new(registry),
        }
    }
}

fn to_mcp_tool(definition: ToolDefinition) -> Tool {
    let schema = match definition.parameters {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Tool::new(definition.name, definition.description, Arc::new(schema))
}

impl ServerHandler for ToolServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation {
            name: SERVER_NAME.to_string(),
            title: None,
            version: SERVER_VERSION.to_string(),
            website_url: None,
            icons: None,
        };
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self
            .dispatcher
            .registry()
            .definitions()
            .into_iter()
            .map(to_mcp_tool)
            .collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        if !self.dispatcher.registry().has(&request.name) {
            warn!("Call for unknown tool {}", request.name);
            return Err(ErrorData::invalid_params(
                format!("tool not found: {}", request.name),
                None,
            ));
        }

        let call = FunctionCall::new(request.name.into_owned(), request.arguments.unwrap_or_default());
        Ok(match self.dispatcher.execute(&call).await {
            FunctionResult::Output(text) => CallToolResult::success(vec![Content::text(text)]),
            FunctionResult::Error(text) => CallToolResult::error(vec![Content::text(text)]),
        })
    }
}

/// Live sessions of one server. Idle sessions are dropped after the
/// configured timeout; all of them are closed on shutdown.
#[derive(Clone)]
pub struct Sessions {
    manager: Arc<LocalSessionManager>,
}

impl Sessions {
    pub fn new(idle_timeout: Duration) -> Self {
        let mut session_config = SessionConfig::default();
        session_config.keep_alive = Some(idle_timeout);

        let mut manager = LocalSessionManager::default();
        manager.session_config = session_config;
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.manager.session_config.keep_alive
    }

    pub async fn len(&self) -> usize {
        self.manager.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every open session. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<_> = self.manager.sessions.read().await.keys().cloned().collect();
        let mut closed = 0;
        for id in ids {
            match self.manager.close_session(&id).await {
                Ok(()) => closed += 1,
                Err(e) => debug!("Failed to close session {}: {}", id, e),
            }
        }
        closed
    }
}

/// Build the `/mcp` router over the given registry.
pub fn router(registry: Arc<ToolRegistry<External>>, sessions: &Sessions) -> Router {
    let handler = ToolServer::new(registry);
    let service = StreamableHttpService::new(
        move || Ok(handler.clone()),
        sessions.manager.clone(),
        StreamableHttpServerConfig::default(),
    );
    Router::new().nest_service("/mcp", service)
}

/// Serve until `cancel` fires.
pub async fn serve(
    addr: &str,
    registry: Arc<ToolRegistry<External>>,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    info!(
        "Registered {} external tools: {}",
        registry.len(),
        registry.names().join(", ")
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind MCP server to {}", addr))?;
    info!("Starting MCP server on {}...", addr);

    serve_on(listener, registry, Sessions::new(idle_timeout), cancel).await
}

/// Serve on an already-bound listener until `cancel` fires.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    registry: Arc<ToolRegistry<External>>,
    sessions: Sessions,
    cancel: CancellationToken,
) -> Result<()> {
    let app = router(registry, &sessions);

    // Open sessions hold streams; close them so graceful shutdown can finish.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            let closed = sessions.close_all().await;
            debug!("Closed {} MCP sessions", closed);
        })
        .await
        .context("MCP server error")?;

    info!("MCP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::{result_failed, result_text, McpClient};
    use crate::mcp::McpError;
    use crate::tools::external_registry;

    async fn spawn(sessions: Sessions) -> (String, CancellationToken) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/mcp", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        tokio::spawn(serve_on(
            listener,
            Arc::new(external_registry()),
            sessions,
            cancel.clone(),
        ));
        (endpoint, cancel)
    }

    async fn connect(endpoint: &str) -> McpClient {
        McpClient::connect(endpoint, Duration::from_secs(5)).await.unwrap()
    }

    #[tokio::test]
    async fn healthz_over_session() {
        let (endpoint, cancel) = spawn(Sessions::new(Duration::from_secs(60))).await;
        let client = connect(&endpoint).await;

        let info = client.server_info().await.unwrap();
        assert_eq!(info.name, SERVER_NAME);
        assert_eq!(info.version, SERVER_VERSION);

        let result = client.call_tool("healthz", Default::default()).await.unwrap();
        assert!(!result_failed(&result));
        assert_eq!(result_text(&result), "OK");

        client.close().await.unwrap();
        cancel.cancel();
    }

    #[tokio::test]
    async fn internal_tools_are_not_exposed() {
        let (endpoint, cancel) = spawn(Sessions::new(Duration::from_secs(60))).await;
        let client = connect(&endpoint).await;

        let names: Vec<String> = client
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["healthz".to_string()]);

        let err = client.call_tool("echo", Default::default()).await.unwrap_err();
        match err {
            McpError::Rpc { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "tool not found: echo");
            }
            other => panic!("unexpected {other:?}"),
        }

        client.close().await.unwrap();
        cancel.cancel();
    }

    #[tokio::test]
    async fn sessions_are_tracked_and_closed() {
        let sessions = Sessions::new(Duration::from_secs(60));
        let (endpoint, cancel) = spawn(sessions.clone()).await;

        let first = connect(&endpoint).await;
        let second = connect(&endpoint).await;
        assert_eq!(sessions.len().await, 2);

        assert_eq!(sessions.close_all().await, 2);
        assert!(sessions.is_empty().await);

        first.close().await.unwrap();
        second.close().await.unwrap();
        cancel.cancel();
    }

    #[test]
    fn idle_timeout_bounds_sessions() {
        let sessions = Sessions::new(Duration::from_secs(300));
        assert_eq!(sessions.idle_timeout(), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let (endpoint, cancel) = spawn(Sessions::new(Duration::from_secs(60))).await;

        let resp = reqwest::Client::new()
            .post(&endpoint)
            .header("accept", "application/json, text/event-stream")
            .header("mcp-session-id", "01NOTASESSION")
            .json(&serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_client_error());

        cancel.cancel();
    }
}
