//! deepspec — Gemini chat console with MCP tool calling.
//!
//! The console keeps one connection to a remote MCP tool server alive and
//! drives a tool-calling conversation against Vertex AI. The same binary can
//! serve its own external tools over MCP.

pub mod agent;
pub mod config;
pub mod console;
pub mod heartbeat;
pub mod mcp;
pub mod tools;
pub mod types;
pub mod vertex;
