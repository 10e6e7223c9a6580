//! 路由器：每轮 Start -> IntentResolved -> Dispatched -> Completed
//!
//! 意图未知时先识别意图，然后在完整历史上运行编排器；编排器没有给出回复时，
//! 按意图直接调用对应的 Handler 作为确定性兜底。任何失败都记入 state.errors，
//! 消息与意图保持本轮开始前的样子。

use std::fmt;
use std::sync::Arc;

use crate::agents::HandlerRegistry;
use crate::core::ConversationState;
use crate::intent::IntentClassifier;
use crate::memory::{Message, Role};
use crate::react::extract_final_text;

/// 路由阶段（仅用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterPhase {
    Start,
    IntentResolved,
    Dispatched,
    Completed,
}

impl fmt::Display for RouterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouterPhase::Start => "start",
            RouterPhase::IntentResolved => "intent_resolved",
            RouterPhase::Dispatched => "dispatched",
            RouterPhase::Completed => "completed",
        };
        f.write_str(s)
    }
}

pub struct Router {
    classifier: IntentClassifier,
    registry: Arc<HandlerRegistry>,
}

impl Router {
    pub fn new(classifier: IntentClassifier, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            classifier,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// 跑完一轮路由；成功返回回复并把轨迹、意图写回 state，失败返回 None
    pub async fn route(&self, state: &mut ConversationState) -> Option<String> {
        tracing::debug!(phase = %RouterPhase::Start, message_count = state.messages.len(), "route");
        let query = state.last_user_message().map(Message::text);

        let previous_intent = state.user_intent;
        if !state.user_intent.is_known() {
            if let Some(ref q) = query {
                let intent = self.classifier.classify(q).await;
                state.resolve_intent(intent);
            }
        }
        tracing::debug!(phase = %RouterPhase::IntentResolved, intent = %state.user_intent, "route");

        match self.dispatch(state, query.as_deref()).await {
            Ok((mut new_messages, reply)) => {
                for failed in new_messages.iter().filter(|m| m.is_error) {
                    let tool = failed.name.as_deref().unwrap_or("tool");
                    tracing::warn!(tool = %tool, error = %failed.text(), "tool failed during routing");
                    state.errors.push(format!("{tool}: {}", failed.text()));
                }
                // 本轮的 assistant 消息记为实际交付的回复，下一轮上下文与持久化都以它为准
                if extract_final_text(&new_messages) != reply {
                    if new_messages
                        .last()
                        .is_some_and(|m| m.role == Role::Assistant && !m.has_tool_calls())
                    {
                        new_messages.pop();
                    }
                    new_messages.push(Message::assistant(reply.clone()));
                }
                state.messages.extend(new_messages);
                state.last_result = Some(reply.clone());
                tracing::info!(
                    phase = %RouterPhase::Completed,
                    intent = %state.user_intent,
                    message_count = state.messages.len(),
                    "route"
                );
                Some(reply)
            }
            Err(errors) => {
                for e in &errors {
                    tracing::error!(intent = %state.user_intent, error = %e, "routing failed");
                }
                state.user_intent = previous_intent;
                state.last_result = None;
                state.errors.extend(errors);
                None
            }
        }
    }

    /// 运行编排器；空回复时按意图兜底
    async fn dispatch(
        &self,
        state: &ConversationState,
        query: Option<&str>,
    ) -> Result<(Vec<Message>, String), Vec<String>> {
        tracing::debug!(phase = %RouterPhase::Dispatched, intent = %state.user_intent, "route");
        let run = self
            .registry
            .orchestrator()
            .run(state)
            .await
            .map_err(|e| vec![e.to_string()])?;

        if !run.reply.trim().is_empty() {
            return Ok((run.new_messages, run.reply));
        }

        let Some(query) = query else {
            return Err(vec!["orchestrator produced no reply".to_string()]);
        };
        let handler = self.registry.for_intent(state.user_intent);
        tracing::warn!(
            agent = %handler.kind().name(),
            intent = %state.user_intent,
            "orchestrator produced no reply, dispatching by intent"
        );
        let reply = handler
            .process(query, Some(state))
            .await
            .into_payload()?;
        Ok((run.new_messages, reply))
    }
}
