//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（单次文本补全）、
//! complete_with_tools（带工具定义的一步，返回文本或工具调用）。多步工具循环由 react::ToolLoop 驱动。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::memory::{Message, MessageContent, ToolCall};

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    /// 服务端返回的错误（code 为错误码或错误类型）
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// 提供给模型的工具定义（function calling）
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// 参数 JSON Schema
    pub parameters: Value,
}

/// 带工具的一步补全结果：文本内容与（可能为空的）工具调用
#[derive(Debug, Clone, Default)]
pub struct LlmTurn {
    pub content: MessageContent,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: MessageContent::default(),
            tool_calls,
        }
    }

    /// 转成写入对话轨迹的 assistant 消息
    pub fn into_message(self) -> Message {
        if self.tool_calls.is_empty() {
            Message::assistant_content(self.content)
        } else {
            Message::assistant_tool_calls(self.content, self.tool_calls)
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 单次补全；system 为空时不发送 system 消息
    async fn complete(
        &self,
        messages: &[Message],
        system: &str,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// 带工具定义的一步补全
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        system: &str,
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<LlmTurn, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
