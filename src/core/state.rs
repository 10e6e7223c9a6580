//! 会话工作状态
//!
//! 每个会话一份 ConversationState：由 Workflow 持有并在每轮对话中更新一次；
//! 消息只追加不重排，意图只会从 Unknown 变为 Explain / Learn。

use serde::Serialize;

use crate::intent::UserIntent;
use crate::memory::{Message, Role};

/// 一个会话的工作记忆
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    /// 最近一次用户原始输入
    pub user_query: String,
    pub user_intent: UserIntent,
    /// 每完成一轮往返加一
    pub turn_count: u64,
    /// 最近一次路由产出的回复
    pub last_result: Option<String>,
    /// 本轮累计的错误，每轮开始时清空
    pub errors: Vec<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从末尾向前找最近一条 user 消息（中间可能夹着工具消息）
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// 设置意图；已确定的意图不会被覆盖，也不会回到 Unknown
    pub fn resolve_intent(&mut self, intent: UserIntent) {
        if !self.user_intent.is_known() && intent.is_known() {
            self.user_intent = intent;
        }
    }
}

/// 对话上下文摘要：最近 max_messages 条中的 user / assistant 文本，
/// assistant 超过 100 字符时截断；工具往来不计入
pub fn conversation_context(state: &ConversationState, max_messages: usize) -> String {
    let start = state.messages.len().saturating_sub(max_messages);
    state.messages[start..]
        .iter()
        .filter(|m| !m.is_tool_traffic())
        .filter_map(|m| match m.role {
            Role::User => Some(format!("User: {}", m.text())),
            Role::Assistant => {
                let text = m.text();
                if text.is_empty() {
                    return None;
                }
                let shown = if text.chars().count() > 100 {
                    format!("{}...", text.chars().take(100).collect::<String>())
                } else {
                    text
                };
                Some(format!("Exam Helper: {}", shown))
            }
            Role::System | Role::Tool => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
