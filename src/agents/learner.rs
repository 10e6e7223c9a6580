//! Learner：带检索工具的循环，整理学习资料 / 复习提纲

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{AgentKind, Handler, HandlerResult};
use crate::core::{conversation_context, ConversationState};
use crate::memory::Message;
use crate::react::ToolLoop;

const LEARNER_PROMPT: &str = "You are a study assistant that prepares learning material for a student.
When the student asks for notes, a summary, revision material or resources on a topic:
- use the web_search tool to find a reliable source when it helps
- turn what you find into well structured study notes: headings, key points, definitions, a worked example
- cite the sources you used by URL at the end
If search is unavailable or returns nothing useful, write the material from your own knowledge and say so.

CONVERSATION CONTEXT:
{context}
";

pub struct LearnerAgent {
    tool_loop: ToolLoop,
    temperature: f32,
}

impl LearnerAgent {
    pub fn new(tool_loop: ToolLoop, temperature: f32) -> Self {
        Self {
            tool_loop,
            temperature,
        }
    }
}

#[async_trait]
impl Handler for LearnerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Learner
    }

    fn get_prompt(&self, state: Option<&ConversationState>) -> String {
        let context = state.map(|s| conversation_context(s, 6)).unwrap_or_default();
        LEARNER_PROMPT.replace("{context}", &context)
    }

    async fn process(&self, query: &str, state: Option<&ConversationState>) -> HandlerResult {
        let prompt = self.get_prompt(state);
        match self
            .tool_loop
            .run(vec![Message::user(query)], &prompt, self.temperature)
            .await
        {
            Ok(outcome) => HandlerResult::ok(outcome.final_text),
            Err(e) => {
                tracing::error!(agent = %self.kind().name(), error = %e, "Learner agent processing failed");
                HandlerResult::failed(e.to_string())
            }
        }
    }
}
