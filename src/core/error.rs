//! 错误类型
//!
//! AgentError 覆盖配置、LLM 与工具；各层在自己的边界把它降级为 HandlerResult / errors 字段，
//! 只有配置错误会在启动时直接返回给调用方。存储写入失败单独用 StoreError 表示，由协调器降级为警告。

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 缺少凭证等启动期错误，不做恢复
    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("Tool loop exceeded {0} steps without a final answer")]
    ToolLoopExhausted(usize),
}

/// 会话存储写入失败；读取失败一律按「不存在」处理，不会产生此错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to write conversation '{id}': {source}")]
    Write {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode conversation '{id}': {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
