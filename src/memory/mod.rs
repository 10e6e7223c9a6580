//! 记忆层：对话消息模型与基于文件的会话存储

pub mod conversation;
pub mod store;

pub use conversation::{ContentBlock, Message, MessageContent, Role, ToolCall};
pub use store::{
    sanitize_conversation_id, ConversationRecord, ConversationStore, ConversationSummary,
    Metadata, StoredMessage,
};
