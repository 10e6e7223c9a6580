//! Explainer：单次补全，用学生能理解的方式讲清一个概念

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{AgentKind, Handler, HandlerResult};
use crate::core::{conversation_context, ConversationState};
use crate::llm::LlmClient;
use crate::memory::Message;

const EXPLAINER_PROMPT: &str = "You are a patient tutor helping a student prepare for an exam.
Explain the concept the student asks about so that they can grasp it quickly:
- start with a one or two sentence intuition
- then give the key ideas step by step, with a small concrete example
- point out a common mistake or misconception
- finish with a short check question the student can answer
Keep it clear and concise; do not invent facts you are unsure about.

CONVERSATION CONTEXT:
{context}
";

pub struct ExplainerAgent {
    llm: Arc<dyn LlmClient>,
    temperature: f32,
}

impl ExplainerAgent {
    pub fn new(llm: Arc<dyn LlmClient>, temperature: f32) -> Self {
        Self { llm, temperature }
    }
}

#[async_trait]
impl Handler for ExplainerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Explainer
    }

    fn get_prompt(&self, state: Option<&ConversationState>) -> String {
        let context = state.map(|s| conversation_context(s, 6)).unwrap_or_default();
        EXPLAINER_PROMPT.replace("{context}", &context)
    }

    async fn process(&self, query: &str, state: Option<&ConversationState>) -> HandlerResult {
        let prompt = self.get_prompt(state);
        match self
            .llm
            .complete(&[Message::user(query)], &prompt, self.temperature)
            .await
        {
            Ok(text) => HandlerResult::ok(text),
            Err(e) => {
                tracing::error!(agent = %self.kind().name(), error = %e, "Explainer agent processing failed");
                HandlerResult::failed(e.to_string())
            }
        }
    }
}
