//! 核心层：错误类型与会话工作状态

pub mod error;
pub mod state;

pub use error::{AgentError, StoreError};
pub use state::{conversation_context, ConversationState};
