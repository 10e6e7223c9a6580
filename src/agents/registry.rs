//! 智能体注册表：启动时构造一次并向下传递（不使用进程级单例）
//!
//! 持有三个 Handler 实例；编排器的工具就是另外两个 Handler 的 AgentTool 包装。

use std::sync::Arc;

use serde::Serialize;

use crate::agents::{AgentKind, ExplainerAgent, Handler, LearnerAgent, OrchestratorAgent};
use crate::config::{AgentSettings, AppConfig};
use crate::core::AgentError;
use crate::intent::UserIntent;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::react::ToolLoop;
use crate::tools::{AgentTool, FirecrawlClient, RetrievalClient, ToolExecutor, ToolRegistry, WebSearchTool};

/// 智能体元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDefinition {
    pub kind: AgentKind,
    pub name: &'static str,
    pub display_name: &'static str,
    pub default_model: String,
    pub default_temperature: f32,
}

/// 每个智能体使用的 LLM 客户端
#[derive(Clone)]
pub struct AgentClients {
    pub orchestrator: Arc<dyn LlmClient>,
    pub explainer: Arc<dyn LlmClient>,
    pub learner: Arc<dyn LlmClient>,
}

impl AgentClients {
    /// 三个智能体共用同一个客户端
    pub fn shared(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            orchestrator: llm.clone(),
            explainer: llm.clone(),
            learner: llm,
        }
    }

    /// 按 [agents.*].model 覆盖创建客户端；未覆盖的复用同一个默认客户端
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let default = create_llm_from_config(cfg, None)?;
        let pick = |settings: &AgentSettings| -> Result<Arc<dyn LlmClient>, AgentError> {
            match settings.model.as_deref() {
                Some(model) if model != cfg.llm.model => create_llm_from_config(cfg, Some(model)),
                _ => Ok(default.clone()),
            }
        };
        Ok(Self {
            orchestrator: pick(&cfg.agents.orchestrator)?,
            explainer: pick(&cfg.agents.explainer)?,
            learner: pick(&cfg.agents.learner)?,
        })
    }
}

/// 智能体注册表
pub struct HandlerRegistry {
    orchestrator: Arc<OrchestratorAgent>,
    explainer: Arc<ExplainerAgent>,
    learner: Arc<LearnerAgent>,
    /// 编排器用于生成开场白的客户端
    orchestrator_llm: Arc<dyn LlmClient>,
    definitions: Vec<AgentDefinition>,
}

impl HandlerRegistry {
    /// 按配置创建 LLM 与检索客户端；LLM 凭证缺失时返回 Config 错误
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let clients = AgentClients::from_config(cfg)?;
        let retrieval: Arc<dyn RetrievalClient> = Arc::new(FirecrawlClient::from_config(&cfg.retrieval));
        Ok(Self::with_clients(clients, retrieval, cfg))
    }

    /// 显式注入客户端（测试用 Mock 与桩检索）
    pub fn with_clients(
        clients: AgentClients,
        retrieval: Arc<dyn RetrievalClient>,
        cfg: &AppConfig,
    ) -> Self {
        let timeout = cfg.tools.tool_timeout_secs;
        let max_steps = cfg.llm.max_tool_steps;

        let explainer = Arc::new(ExplainerAgent::new(
            clients.explainer.clone(),
            cfg.agents.explainer.temperature,
        ));

        let mut learner_tools = ToolRegistry::new();
        learner_tools.register(WebSearchTool::from_config(retrieval, &cfg.retrieval));
        let learner = Arc::new(LearnerAgent::new(
            ToolLoop::new(clients.learner.clone(), ToolExecutor::new(learner_tools, timeout), max_steps),
            cfg.agents.learner.temperature,
        ));

        let mut agent_tools = ToolRegistry::new();
        agent_tools.register(AgentTool::new(explainer.clone()));
        agent_tools.register(AgentTool::new(learner.clone()));
        let orchestrator = Arc::new(OrchestratorAgent::new(
            ToolLoop::new(clients.orchestrator.clone(), ToolExecutor::new(agent_tools, timeout), max_steps),
            cfg.agents.orchestrator.temperature,
        ));

        let definitions = AgentKind::ALL
            .iter()
            .map(|&kind| {
                let settings = match kind {
                    AgentKind::Orchestrator => &cfg.agents.orchestrator,
                    AgentKind::Explainer => &cfg.agents.explainer,
                    AgentKind::Learner => &cfg.agents.learner,
                };
                AgentDefinition {
                    kind,
                    name: kind.name(),
                    display_name: match kind {
                        AgentKind::Orchestrator => "Orchestrator Agent",
                        AgentKind::Explainer => "Explainer Agent",
                        AgentKind::Learner => "Learner Agent",
                    },
                    default_model: settings.model.clone().unwrap_or_else(|| cfg.llm.model.clone()),
                    default_temperature: settings.temperature,
                }
            })
            .collect();

        tracing::info!(agents = AgentKind::ALL.len(), "agents initialized");
        Self {
            orchestrator,
            explainer,
            learner,
            orchestrator_llm: clients.orchestrator,
            definitions,
        }
    }

    pub fn get(&self, kind: AgentKind) -> Arc<dyn Handler> {
        match kind {
            AgentKind::Orchestrator => self.orchestrator.clone(),
            AgentKind::Explainer => self.explainer.clone(),
            AgentKind::Learner => self.learner.clone(),
        }
    }

    pub fn orchestrator(&self) -> &OrchestratorAgent {
        &self.orchestrator
    }

    pub fn orchestrator_llm(&self) -> Arc<dyn LlmClient> {
        self.orchestrator_llm.clone()
    }

    /// 编排器没有给出回复时的确定性兜底：learn 交给 learner，其余交给 explainer
    pub fn for_intent(&self, intent: UserIntent) -> Arc<dyn Handler> {
        match intent {
            UserIntent::Learn => self.get(AgentKind::Learner),
            UserIntent::Explain | UserIntent::Unknown => self.get(AgentKind::Explainer),
        }
    }

    pub fn definitions(&self) -> &[AgentDefinition] {
        &self.definitions
    }
}
