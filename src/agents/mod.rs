//! 智能体：编排器（Orchestrator）与两个能力处理器（Explainer / Learner）
//!
//! 所有变体实现 Handler：get_prompt / get_result_key / process。process 永不 panic、永不返回 Err，
//! 内部错误一律收敛为 HandlerResult::failed。变体集合是封闭的 AgentKind 枚举，不按字符串查找类名。

pub mod explainer;
pub mod learner;
pub mod orchestrator;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::ConversationState;

pub use explainer::ExplainerAgent;
pub use learner::LearnerAgent;
pub use orchestrator::{OrchestratorAgent, OrchestratorRun};
pub use registry::{AgentClients, AgentDefinition, HandlerRegistry};

/// 智能体种类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Orchestrator,
    Explainer,
    Learner,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Orchestrator, AgentKind::Explainer, AgentKind::Learner];

    /// 规范名（日志、注册表）
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Orchestrator => "orchestrator_agent",
            AgentKind::Explainer => "explainer_agent",
            AgentKind::Learner => "learner_agent",
        }
    }

    /// 作为工具暴露给编排器时的名字
    pub fn tool_name(&self) -> &'static str {
        match self {
            AgentKind::Orchestrator => "orchestrator",
            AgentKind::Explainer => "explainer",
            AgentKind::Learner => "learner",
        }
    }

    pub fn result_key(&self) -> &'static str {
        match self {
            AgentKind::Orchestrator => "orchestrator_result",
            AgentKind::Explainer => "explainer_agent_result",
            AgentKind::Learner => "learner_agent_result",
        }
    }
}

/// 一次处理的结果：成功则有 payload 且 errors 为空，失败则无 payload 且至少一条错误
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResult {
    success: bool,
    payload: Option<String>,
    errors: Vec<String>,
}

impl HandlerResult {
    /// 成功结果；空白回复视为失败
    pub fn ok(payload: impl Into<String>) -> Self {
        let payload = payload.into();
        if payload.trim().is_empty() {
            return Self::failed("empty reply");
        }
        Self {
            success: true,
            payload: Some(payload),
            errors: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            errors: vec![error.into()],
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_payload(self) -> Result<String, Vec<String>> {
        match self.payload {
            Some(p) if self.success => Ok(p),
            _ => Err(self.errors),
        }
    }
}

/// 能力处理器
#[async_trait]
pub trait Handler: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// 本次调用的 system 指令；state 为空时不带上下文
    fn get_prompt(&self, state: Option<&ConversationState>) -> String;

    fn get_result_key(&self) -> &'static str {
        self.kind().result_key()
    }

    /// 处理一次请求；不会返回错误，失败体现在 HandlerResult 中
    async fn process(&self, query: &str, state: Option<&ConversationState>) -> HandlerResult;
}
