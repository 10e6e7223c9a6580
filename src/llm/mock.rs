//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序消费预设回复（文本 / 工具调用 / 错误），并记录每次调用便于断言；
//! 预设用尽后回显最后一条 user 消息。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, LlmError, LlmTurn, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// 一条预设回复
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    ToolCall { name: String, args: Value },
    Error(String),
}

impl MockReply {
    pub fn text(s: impl Into<String>) -> Self {
        MockReply::Text(s.into())
    }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        MockReply::ToolCall {
            name: name.into(),
            args,
        }
    }

    pub fn error(s: impl Into<String>) -> Self {
        MockReply::Error(s.into())
    }
}

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<Message>,
    pub system: String,
    pub temperature: f32,
    /// 调用时提供的工具名（complete 为空）
    pub tools: Vec<String>,
}

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<MockCall>>,
    next_call_id: AtomicU64,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn record(&self, messages: &[Message], system: &str, temperature: f32, tools: &[ToolSpec]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                messages: messages.to_vec(),
                system: system.to_string(),
                temperature,
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }

    fn echo(messages: &[Message]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_else(|| "(no input)".to_string());
        format!("Echo from Mock: {}", last_user)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        system: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.record(messages, system, temperature, &[]);
        match self.next_reply() {
            Some(MockReply::Text(s)) => Ok(s),
            Some(MockReply::ToolCall { name, .. }) => Err(LlmError::InvalidResponse(format!(
                "tool call '{name}' scripted for a plain completion"
            ))),
            Some(MockReply::Error(e)) => Err(LlmError::Request(e)),
            None => Ok(Self::echo(messages)),
        }
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        system: &str,
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<LlmTurn, LlmError> {
        self.record(messages, system, temperature, tools);
        match self.next_reply() {
            Some(MockReply::Text(s)) => Ok(LlmTurn::text(s)),
            Some(MockReply::ToolCall { name, args }) => {
                let n = self.next_call_id.fetch_add(1, Ordering::Relaxed);
                Ok(LlmTurn::tool_calls(vec![ToolCall {
                    id: format!("call_{n}"),
                    name,
                    args,
                }]))
            }
            Some(MockReply::Error(e)) => Err(LlmError::Request(e)),
            None => Ok(LlmTurn::text(Self::echo(messages))),
        }
    }
}
