//! Mentor - 考试学习助手
//!
//! 模块划分：
//! - **agent**: 运行时装配（按配置创建 Workflow）
//! - **agents**: 编排器与 Explainer / Learner 处理器、智能体注册表
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话工作状态
//! - **intent**: 意图识别（explain / learn / unknown）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 消息模型与基于文件的会话存储
//! - **observability**: 日志初始化
//! - **react**: 工具调用循环与回复提取
//! - **tools**: 工具注册表、执行器、Web 检索、智能体工具
//! - **workflow**: 路由器与会话协调器

pub mod agent;
pub mod agents;
pub mod config;
pub mod core;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
pub mod workflow;

pub use agent::create_workflow;
pub use workflow::{TurnOutcome, Workflow};
