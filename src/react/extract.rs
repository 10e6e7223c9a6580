//! 从消息轨迹中提取回复文本

use crate::memory::{Message, Role};

/// 最后一条由模型撰写、不含工具调用且文本非空的 assistant 消息；工具输出一律跳过
pub fn extract_final_text(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant && !m.has_tool_calls())
        .map(Message::text)
        .find(|t| !t.trim().is_empty())
        .unwrap_or_default()
}

/// 编排器回复提取：优先最后一条成功的非空工具输出，其次最后一条普通 assistant 文本；都没有则为空
///
/// 失败的工具输出（is_error）永远不会成为回复。只应传入本轮新产生的消息，否则会取到历史轮次的内容。
pub fn extract_orchestrator_reply(messages: &[Message]) -> String {
    let last_tool_output = messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::Tool && !m.is_error)
        .map(Message::text)
        .find(|t| !t.trim().is_empty());

    last_tool_output.unwrap_or_else(|| extract_final_text(messages))
}
