pub mod conversation;
pub mod system_prompt;

pub use conversation::{ConversationError, ConversationLoop};
