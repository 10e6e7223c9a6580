//! 把能力处理器包装成工具，交给编排器通过 function calling 选择

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::agents::{AgentKind, Handler};
use crate::core::ConversationState;
use crate::memory::Message;
use crate::tools::schema::parameters_schema;
use crate::tools::Tool;

/// 智能体工具的参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AgentToolInput {
    /// The user's message to respond to
    pub message: String,
    /// Conversation context/summary
    #[serde(default)]
    pub context: String,
}

/// 智能体工具：转发给 Handler::process
pub struct AgentTool {
    handler: Arc<dyn Handler>,
    description: &'static str,
}

impl AgentTool {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        let description = match handler.kind() {
            AgentKind::Explainer => "Use when user wants a certain concept to be explained.",
            AgentKind::Learner => "Use when user asks for material to study a certain topic",
            AgentKind::Orchestrator => "Route a message to the most suitable agent.",
        };
        Self {
            handler,
            description,
        }
    }
}

/// context 非空时构造只含一条 user 消息的最小状态
fn context_state(context: &str) -> Option<ConversationState> {
    if context.trim().is_empty() {
        return None;
    }
    let mut state = ConversationState::new();
    state.messages.push(Message::user(context));
    Some(state)
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        self.handler.kind().tool_name()
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<AgentToolInput>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let input: AgentToolInput = match args {
            Value::String(message) => AgentToolInput {
                message,
                context: String::new(),
            },
            other => serde_json::from_value(other).map_err(|e| format!("invalid arguments: {e}"))?,
        };
        let state = context_state(&input.context);
        self.handler
            .process(&input.message, state.as_ref())
            .await
            .into_payload()
            .map_err(|errors| errors.join("; "))
    }
}
