pub mod client;
pub mod session;

pub use client::VertexClient;
pub use session::{BackendError, ChatBackend, ChatSession, Content, ModelResponse, Part};
