//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MENTOR__*` 覆盖（双下划线表示嵌套，如 `MENTOR__LLM__PROVIDER=openai`）。
//! 所有字段都有默认值，没有任何配置源时也能得到可用的配置。

use std::path::PathBuf;

use serde::Deserialize;

/// Gemini 的 OpenAI 兼容端点
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agents: AgentsSection,
    pub retrieval: RetrievalSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、会话存储目录、兜底回复
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 会话 JSON 文件目录
    pub storage_dir: PathBuf,
    /// 路由失败时返回给用户的固定回复
    pub fallback_reply: String,
    /// 控制台退出时的告别语
    pub farewell: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Exam Helper".to_string(),
            storage_dir: PathBuf::from("data/conversations"),
            fallback_reply: "Hi there! What's up?".to_string(),
            farewell: "All the best :)) You will do well!! Dont worry : )) Goodbye!".to_string(),
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock
    pub provider: String,
    pub model: String,
    /// 未设置时 gemini 使用其 OpenAI 兼容端点，openai 使用官方默认
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名；未设置时按 provider 取默认
    pub api_key_env: Option<String>,
    /// 单次工具循环最多轮数
    pub max_tool_steps: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: None,
            api_key_env: None,
            max_tool_steps: 8,
        }
    }
}

impl LlmSection {
    pub fn resolved_base_url(&self) -> Option<String> {
        match (&self.base_url, self.provider.to_lowercase().as_str()) {
            (Some(url), _) => Some(url.clone()),
            (None, "gemini") => Some(GEMINI_OPENAI_BASE_URL.to_string()),
            (None, _) => None,
        }
    }

    pub fn resolved_api_key_env(&self) -> String {
        if let Some(ref name) = self.api_key_env {
            return name.clone();
        }
        match self.provider.to_lowercase().as_str() {
            "openai" => "OPENAI_API_KEY".to_string(),
            _ => "GOOGLE_API_KEY".to_string(),
        }
    }
}

/// [agents.*] 段：每个智能体可单独覆盖模型与温度
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentsSection {
    pub orchestrator: AgentSettings,
    pub explainer: AgentSettings,
    pub learner: AgentSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// 为空时使用 [llm].model
    pub model: Option<String>,
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_temperature(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// [retrieval] 段：Firecrawl 搜索 + 抓取
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub provider_url: String,
    pub api_key_env: String,
    /// 每次搜索抓取的来源数
    pub num_results: usize,
    /// 每个来源保留的最大字符数
    pub max_content_chars: usize,
    pub timeout_secs: u64,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            provider_url: "https://api.firecrawl.dev".to_string(),
            api_key_env: "FIRECRAWL_API_KEY".to_string(),
            num_results: 1,
            max_content_chars: 4000,
            timeout_secs: 30,
        }
    }
}

/// [tools] 段：工具超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）；智能体工具内部还有一整轮 LLM 调用，所以给得比较宽
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 300,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MENTOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MENTOR__*（双下划线表示嵌套键）
///
/// 温度不在 [0, 2] 范围内时返回错误。
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MENTOR")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

impl AppConfig {
    fn validate(&self) -> Result<(), config::ConfigError> {
        let agents = [
            ("orchestrator", &self.agents.orchestrator),
            ("explainer", &self.agents.explainer),
            ("learner", &self.agents.learner),
        ];
        for (name, settings) in agents {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(config::ConfigError::Message(format!(
                    "agents.{name}.temperature must be within [0, 2], got {}",
                    settings.temperature
                )));
            }
        }
        if self.llm.max_tool_steps == 0 {
            return Err(config::ConfigError::Message(
                "llm.max_tool_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
