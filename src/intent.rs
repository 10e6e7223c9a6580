//! 意图识别
//!
//! 用 LLM 作为判别器（temperature = 0）把用户输入归入 explain / learn；
//! 回复不是这两个词之一、或调用失败时一律返回 Unknown，不重试、不中断本轮对话。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::memory::Message;

/// 用户意图（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserIntent {
    #[default]
    Unknown,
    /// 讲解某个概念
    Explain,
    /// 整理学习资料、总结、复习
    Learn,
}

impl UserIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserIntent::Unknown => "unknown",
            UserIntent::Explain => "explain",
            UserIntent::Learn => "learn",
        }
    }

    /// 解析存储或模型给出的标签：去空白、转小写后必须完全匹配，否则为 Unknown
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "explain" => UserIntent::Explain,
            "learn" => UserIntent::Learn,
            _ => UserIntent::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != UserIntent::Unknown
    }
}

impl fmt::Display for UserIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const INTENT_PROMPT: &str = r#"Analyze the user's message and determine their requirement.

User message: "{message}"

Classify as one of:
- explain: explain, teach, help me understand, what is
- learn: create a document, summarise, revision, material

Output ONLY one word: explain, or learn"#;

/// 意图识别器
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 识别用户意图；任何失败都降级为 Unknown
    pub async fn classify(&self, message: &str) -> UserIntent {
        let prompt = INTENT_PROMPT.replace("{message}", message);
        match self.llm.complete(&[Message::user(prompt)], "", 0.0).await {
            Ok(reply) => {
                let intent = UserIntent::from_label(&reply);
                tracing::debug!(intent = %intent, reply = %reply.trim(), "intent classified");
                intent
            }
            Err(e) => {
                tracing::warn!(error = %e, "intent classification failed, using unknown");
                UserIntent::Unknown
            }
        }
    }
}
