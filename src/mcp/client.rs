//! MCP client over streamable HTTP, built on the rmcp SDK.

use crate::mcp::connection::{Connector, ToolServerConnection};
use crate::mcp::error::McpError;
use crate::types::ToolArgs;
use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        Tool,
    },
    service::RunningService,
    transport::StreamableHttpClientTransport,
    RoleClient, ServiceExt,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Identity this client announces in the handshake.
pub const CLIENT_NAME: &str = "deepspec-tui";
pub const CLIENT_VERSION: &str = "0.1.0";

type Service = RunningService<RoleClient, ClientInfo>;

/// One initialized MCP session against one endpoint.
///
/// The transport does not expose the server's session id, so each client
/// carries a local id that changes whenever the session is re-established.
pub struct McpClient {
    id: String,
    endpoint: String,
    timeout: Duration,
    service: RwLock<Option<Service>>,
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: CLIENT_NAME.to_string(),
            title: None,
            version: CLIENT_VERSION.to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Bound `fut` by `limit`, mapping both the deadline and the inner error.
async fn bounded<T, E>(limit: Duration, fut: impl Future<Output = Result<T, E>>) -> Result<T, McpError>
where
    McpError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(McpError::from),
        Err(_) => Err(McpError::Timeout),
    }
}

impl McpClient {
    /// Connect and run the initialize handshake. Every request, the
    /// handshake included, is bounded by `timeout`.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, McpError> {
        debug!("Connecting to MCP server at {}", endpoint);
        let transport = StreamableHttpClientTransport::from_uri(endpoint.to_string());

        let service = match tokio::time::timeout(timeout, client_info().serve(transport)).await {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => return Err(McpError::Handshake(e.to_string())),
            Err(_) => return Err(McpError::Timeout),
        };

        let id = ulid::Ulid::new().to_string();
        match service.peer_info() {
            Some(peer) => info!(
                "Connected to MCP server {} {} (connection {})",
                peer.server_info.name, peer.server_info.version, id
            ),
            None => info!("Connected to MCP server at {} (connection {})", endpoint, id),
        }

        Ok(Self {
            id,
            endpoint: endpoint.to_string(),
            timeout,
            service: RwLock::new(Some(service)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Name and version the server announced.
    pub async fn server_info(&self) -> Option<Implementation> {
        let service = self.service.read().await;
        service
            .as_ref()
            .and_then(|s| s.peer_info())
            .map(|peer| peer.server_info.clone())
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        let service = self.service.read().await;
        let service = service.as_ref().ok_or(McpError::NotInitialized)?;
        let tools = bounded(self.timeout, service.list_all_tools()).await?;
        debug!("Listed {} tools on connection {}", tools.len(), self.id);
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, args: ToolArgs) -> Result<CallToolResult, McpError> {
        let service = self.service.read().await;
        let service = service.as_ref().ok_or(McpError::NotInitialized)?;

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: Some(args),
            task: None,
        };
        debug!("Calling tool {} on connection {}", name, self.id);
        bounded(self.timeout, service.call_tool(params)).await
    }

    /// End the session. Later calls fail with [`McpError::NotInitialized`].
    pub async fn close(&self) -> Result<(), McpError> {
        let Some(service) = self.service.write().await.take() else {
            return Ok(());
        };
        service
            .cancel()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        debug!("Closed connection {}", self.id);
        Ok(())
    }
}

/// Concatenated text content of a tool result.
pub fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text().map(|t| t.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether the server flagged the result as an application-level error.
pub fn result_failed(result: &CallToolResult) -> bool {
    result.is_error.unwrap_or(false)
}

#[async_trait]
impl ToolServerConnection for McpClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call_tool(&self, name: &str, args: ToolArgs) -> Result<CallToolResult, McpError> {
        McpClient::call_tool(self, name, args).await
    }

    async fn close(&self) -> Result<(), McpError> {
        McpClient::close(self).await
    }
}

/// Opens [`McpClient`] sessions against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    endpoint: String,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolServerConnection>, McpError> {
        let client = McpClient::connect(&self.endpoint, self.timeout).await?;
        Ok(Arc::new(client))
    }
}
