//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockCall, MockLlmClient, MockReply};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError, LlmTurn, ToolSpec};

use crate::config::AppConfig;
use crate::core::AgentError;

/// 根据配置选择 LLM 后端（Gemini / OpenAI 兼容 / Mock）
///
/// `model` 为空时使用 [llm].model。非 mock 后端缺少 API Key 时返回 Config 错误，启动即失败。
pub fn create_llm_from_config(
    cfg: &AppConfig,
    model: Option<&str>,
) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.to_lowercase();
    let model = model.unwrap_or(&cfg.llm.model);

    match provider.as_str() {
        "mock" => {
            tracing::warn!("LLM provider is mock, replies are scripted or echoed");
            Ok(Arc::new(MockLlmClient::new()))
        }
        "gemini" | "openai" => {
            let key_env = cfg.llm.resolved_api_key_env();
            let api_key = std::env::var(&key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    AgentError::Config(format!(
                        "{key_env} is not set (required by llm.provider = \"{provider}\")"
                    ))
                })?;
            let base_url = cfg.llm.resolved_base_url();
            tracing::info!(provider = %provider, model = %model, "Using OpenAI-compatible LLM");
            Ok(Arc::new(OpenAiClient::new(base_url.as_deref(), model, &api_key)))
        }
        other => Err(AgentError::Config(format!("unknown llm.provider: {other}"))),
    }
}
