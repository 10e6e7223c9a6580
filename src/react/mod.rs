//! 认知层：工具调用循环与回复提取

pub mod extract;
pub mod loop_;

pub use extract::{extract_final_text, extract_orchestrator_reply};
pub use loop_::{ToolLoop, ToolLoopOutcome};
