//! 运行时装配
//!
//! 供控制台与其他前端调用：按配置创建 LLM 客户端、检索客户端、智能体注册表与会话存储，
//! 返回一个可直接对话的 Workflow。注册表只在这里构造一次，然后向下传递。

use std::sync::Arc;

use crate::agents::HandlerRegistry;
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::memory::ConversationStore;
use crate::workflow::Workflow;

/// 按配置创建 Workflow；conversation_id 为空时开启新会话
///
/// LLM 凭证缺失时返回 AgentError::Config。
pub fn create_workflow(cfg: &AppConfig, conversation_id: Option<String>) -> Result<Workflow, AgentError> {
    let registry = Arc::new(HandlerRegistry::from_config(cfg)?);
    Ok(create_workflow_with_registry(cfg, registry, conversation_id))
}

/// 使用已有注册表创建 Workflow（多个会话可共享同一个注册表）
pub fn create_workflow_with_registry(
    cfg: &AppConfig,
    registry: Arc<HandlerRegistry>,
    conversation_id: Option<String>,
) -> Workflow {
    let store = ConversationStore::new(cfg.app.storage_dir.clone());
    Workflow::new(registry, store, cfg.app.fallback_reply.clone(), conversation_id)
}
