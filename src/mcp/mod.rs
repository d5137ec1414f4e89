//! Remote tool protocol (MCP): client, connection lifecycle, and server.
//!
//! Both sides use the rmcp SDK over streamable HTTP.

pub mod client;
pub mod connection;
pub mod error;
pub mod server;

pub use client::{HttpConnector, McpClient};
pub use connection::{ConnectionManager, Connector, ToolServerConnection};
pub use error::{classify_transport_message, ErrorClass, McpError};
