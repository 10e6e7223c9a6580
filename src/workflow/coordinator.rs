//! 会话协调器
//!
//! 持有一个会话的 ConversationState，并与 ConversationStore 同步：
//! 构造 / load_conversation 时从存储恢复历史，每轮成功后只把 user / assistant 文本消息写回。
//! 同一会话的调用必须串行（&mut self 保证）。

use std::sync::Arc;

use serde_json::{json, Value};

use crate::agents::HandlerRegistry;
use crate::core::ConversationState;
use crate::intent::{IntentClassifier, UserIntent};
use crate::memory::{ConversationStore, ConversationSummary, Message, Metadata, StoredMessage};
use crate::workflow::Router;

const GREETING_PROMPT: &str = "Greet a student who has just opened their exam preparation assistant. \
In one or two short, friendly sentences, say that you can explain concepts or put together study material, \
and ask what they are working on.";

/// 新会话 ID：exam_helper_session_<uuid>
pub fn new_conversation_id() -> String {
    format!("exam_helper_session_{}", uuid::Uuid::new_v4().simple())
}

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub success: bool,
    /// 回复文本；失败时为兜底回复
    pub response: String,
    /// 本轮结束后的状态快照
    pub state: ConversationState,
    /// 失败原因（仅日志 / 调试用，不展示给用户）
    pub error: Option<String>,
    /// 本轮是否成功写入存储
    pub saved: bool,
}

pub struct Workflow {
    router: Router,
    store: ConversationStore,
    conversation_id: String,
    state: Option<ConversationState>,
    fallback_reply: String,
}

impl Workflow {
    /// 创建协调器；conversation_id 为空时生成新 ID，存在历史时立即恢复
    pub fn new(
        registry: Arc<HandlerRegistry>,
        store: ConversationStore,
        fallback_reply: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Self {
        let classifier = IntentClassifier::new(registry.orchestrator_llm());
        let conversation_id = conversation_id.unwrap_or_else(new_conversation_id);
        let state = hydrate(&store, &conversation_id);
        tracing::info!(conversation_id = %conversation_id, resumed = state.is_some(), "workflow initialized");
        Self {
            router: Router::new(classifier, registry),
            store,
            conversation_id,
            state,
            fallback_reply: fallback_reply.into(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn state(&self) -> Option<&ConversationState> {
        self.state.as_ref()
    }

    /// 处理一条用户消息
    pub async fn process_query(&mut self, message: &str) -> TurnOutcome {
        let state = self.state.get_or_insert_with(ConversationState::new);
        state.errors.clear();
        state.user_query = message.to_string();

        let history_len = state.messages.len();
        let previous_intent = state.user_intent;
        state.messages.push(Message::user(message));

        match self.router.route(state).await {
            Some(reply) => {
                state.turn_count += 1;
                let saved = match persist(&self.store, &self.conversation_id, state) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            conversation_id = %self.conversation_id,
                            error = %e,
                            "conversation not saved"
                        );
                        state.errors.push(format!("conversation not saved: {e}"));
                        false
                    }
                };
                TurnOutcome {
                    success: true,
                    response: reply,
                    state: state.clone(),
                    error: None,
                    saved,
                }
            }
            None => {
                state.messages.truncate(history_len);
                state.user_intent = previous_intent;
                let error = state.errors.join("; ");
                tracing::error!(conversation_id = %self.conversation_id, error = %error, "Workflow processing failed");
                TurnOutcome {
                    success: false,
                    response: self.fallback_reply.clone(),
                    state: state.clone(),
                    error: Some(error),
                    saved: false,
                }
            }
        }
    }

    /// 只返回回复文本
    pub async fn chat(&mut self, message: &str) -> String {
        self.process_query(message).await.response
    }

    /// 开场白：一次补全调用，失败或为空时返回兜底回复
    pub async fn greeting(&self) -> String {
        let registry = self.router.registry();
        let temperature = registry.orchestrator().temperature();
        match registry
            .orchestrator_llm()
            .complete(&[Message::user(GREETING_PROMPT)], "", temperature)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => self.fallback_reply.clone(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to get greeting");
                self.fallback_reply.clone()
            }
        }
    }

    /// 丢弃内存状态并换一个新会话 ID；不删除已持久化的记录
    pub fn reset(&mut self) {
        self.state = None;
        self.conversation_id = new_conversation_id();
        tracing::info!(conversation_id = %self.conversation_id, "workflow state reset");
    }

    /// 切换到指定会话并从存储恢复；返回是否存在历史
    pub fn load_conversation(&mut self, conversation_id: &str) -> bool {
        self.conversation_id = conversation_id.to_string();
        self.state = hydrate(&self.store, conversation_id);
        self.state.is_some()
    }

    /// 删除当前会话的持久化记录
    pub fn delete_conversation(&self) -> bool {
        self.store.delete(&self.conversation_id)
    }

    pub fn list_conversations(&self) -> Vec<ConversationSummary> {
        self.store.list()
    }
}

/// 从存储恢复状态；没有消息时视为无历史
fn hydrate(store: &ConversationStore, conversation_id: &str) -> Option<ConversationState> {
    let record = store.load(conversation_id)?;
    if record.messages.is_empty() {
        return None;
    }

    let mut state = ConversationState::new();
    state.messages = record.messages.iter().filter_map(StoredMessage::to_message).collect();
    if let Some(intent) = record.metadata.get("user_intent").and_then(Value::as_str) {
        state.user_intent = UserIntent::from_label(intent);
    }
    if let Some(turns) = record.metadata.get("turn_count").and_then(Value::as_u64) {
        state.turn_count = turns;
    }
    tracing::info!(
        conversation_id = %conversation_id,
        message_count = state.messages.len(),
        intent = %state.user_intent,
        "Loaded conversation history"
    );
    Some(state)
}

/// 只写 user / assistant 文本消息，外加 user_intent 与 turn_count
fn persist(
    store: &ConversationStore,
    conversation_id: &str,
    state: &ConversationState,
) -> Result<(), crate::core::StoreError> {
    let messages: Vec<StoredMessage> = state
        .messages
        .iter()
        .filter(|m| m.is_persistable())
        .map(StoredMessage::from)
        .collect();

    let mut metadata = Metadata::new();
    metadata.insert("user_intent".into(), json!(state.user_intent.as_str()));
    metadata.insert("turn_count".into(), json!(state.turn_count));
    store.save(conversation_id, &messages, &metadata)
}
