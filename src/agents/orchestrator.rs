//! Orchestrator：以 explainer / learner 为工具的调用循环，由模型决定调用哪一个

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{AgentKind, Handler, HandlerResult};
use crate::core::{AgentError, ConversationState};
use crate::memory::Message;
use crate::react::{extract_orchestrator_reply, ToolLoop};

const ORCHESTRATOR_PROMPT: &str = "You are the coordinator of an exam preparation assistant.
You have two tools:
- explainer: when the student wants a concept explained
- learner: when the student wants study material, notes, a summary or revision resources
Pick the tool that matches the student's latest message and pass their message (and a short summary
of the conversation as context). Call at most one tool per message unless the student asks for both.
For greetings, thanks or small talk, answer briefly yourself without calling a tool.

CURRENT STATE:
- Intent: {intent}
";

/// 一次编排的产物：本轮新增的消息轨迹与提取出的回复（可能为空）
#[derive(Debug, Clone)]
pub struct OrchestratorRun {
    pub new_messages: Vec<Message>,
    pub reply: String,
}

pub struct OrchestratorAgent {
    tool_loop: ToolLoop,
    temperature: f32,
}

impl OrchestratorAgent {
    pub fn new(tool_loop: ToolLoop, temperature: f32) -> Self {
        Self {
            tool_loop,
            temperature,
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_loop.tool_names()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// 在完整历史上跑一次工具循环
    pub async fn run(&self, state: &ConversationState) -> Result<OrchestratorRun, AgentError> {
        let prompt = self.get_prompt(Some(state));
        let history_len = state.messages.len();
        let outcome = self
            .tool_loop
            .run(state.messages.clone(), &prompt, self.temperature)
            .await?;

        let new_messages: Vec<Message> = outcome.messages.into_iter().skip(history_len).collect();
        let reply = extract_orchestrator_reply(&new_messages);
        tracing::debug!(
            agent = %self.kind().name(),
            message_count = new_messages.len(),
            empty = reply.trim().is_empty(),
            "orchestration finished"
        );
        Ok(OrchestratorRun {
            new_messages,
            reply,
        })
    }
}

#[async_trait]
impl Handler for OrchestratorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Orchestrator
    }

    fn get_prompt(&self, state: Option<&ConversationState>) -> String {
        let intent = state.map(|s| s.user_intent.as_str()).unwrap_or("unknown");
        ORCHESTRATOR_PROMPT.replace("{intent}", intent)
    }

    async fn process(&self, query: &str, state: Option<&ConversationState>) -> HandlerResult {
        let owned;
        let state = match state {
            Some(s) => s,
            None => {
                let mut s = ConversationState::new();
                s.messages.push(Message::user(query));
                owned = s;
                &owned
            }
        };
        match self.run(state).await {
            Ok(run) => HandlerResult::ok(run.reply),
            Err(e) => {
                tracing::error!(agent = %self.kind().name(), error = %e, "Orchestrator processing failed");
                HandlerResult::failed(e.to_string())
            }
        }
    }
}
