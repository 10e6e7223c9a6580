//! 工具调用主循环
//!
//! Ask (带工具定义) -> Act (执行全部工具调用) -> Observe (工具结果写回轨迹) -> 下一轮 Ask；
//! 模型不再请求工具时结束，超过 max_steps 返回 ToolLoopExhausted。
//! 工具失败不会中断循环：错误以 `Error: ...` 的形式作为工具输出交给模型自行处理，
//! 对应的 tool 消息带 is_error 标记。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::extract_final_text;
use crate::tools::ToolExecutor;

/// 工具循环结果：完整消息轨迹（含输入消息）与最终文本
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    pub messages: Vec<Message>,
    pub final_text: String,
}

/// 工具调用循环
pub struct ToolLoop {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    max_steps: usize,
}

impl ToolLoop {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor, max_steps: usize) -> Self {
        Self {
            llm,
            executor,
            max_steps: max_steps.max(1),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    /// 驱动循环直到模型给出不含工具调用的回复
    pub async fn run(
        &self,
        messages: Vec<Message>,
        system: &str,
        temperature: f32,
    ) -> Result<ToolLoopOutcome, AgentError> {
        let specs = self.executor.specs();
        let mut trace = messages;

        for step in 1..=self.max_steps {
            let turn = self
                .llm
                .complete_with_tools(&trace, system, &specs, temperature)
                .await?;

            if turn.tool_calls.is_empty() {
                trace.push(turn.into_message());
                let final_text = extract_final_text(&trace);
                tracing::debug!(step, message_count = trace.len(), "tool loop finished");
                return Ok(ToolLoopOutcome {
                    messages: trace,
                    final_text,
                });
            }

            let calls = turn.tool_calls.clone();
            trace.push(turn.into_message());
            for call in calls {
                tracing::info!(step, tool = %call.name, "tool call");
                let message = match self.executor.execute(&call.name, call.args.clone()).await {
                    Ok(content) => Message::tool_result(call.id, call.name, content),
                    Err(AgentError::HallucinatedTool(name)) => {
                        Message::tool_error(call.id, call.name, format!("Error: unknown tool '{name}'"))
                    }
                    Err(e) => Message::tool_error(call.id, call.name, format!("Error: {e}")),
                };
                trace.push(message);
            }
        }

        tracing::warn!(max_steps = self.max_steps, "tool loop exhausted");
        Err(AgentError::ToolLoopExhausted(self.max_steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockReply};
    use crate::memory::Role;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Notes;

    #[async_trait]
    impl Tool for Notes {
        fn name(&self) -> &str {
            "notes"
        }

        fn description(&self) -> &str {
            "Return study notes for a topic"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            match args.get("topic").and_then(Value::as_str) {
                Some(topic) => Ok(format!("notes on {topic}")),
                None => Err("missing topic".into()),
            }
        }
    }

    fn tool_loop(llm: Arc<MockLlmClient>, max_steps: usize) -> ToolLoop {
        let mut registry = ToolRegistry::new();
        registry.register(Notes);
        ToolLoop::new(llm, ToolExecutor::new(registry, 5), max_steps)
    }

    #[tokio::test]
    async fn test_tool_then_answer() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            MockReply::tool_call("notes", json!({"topic": "sorting"})),
            MockReply::text("Here are your sorting notes."),
        ]));
        let outcome = tool_loop(llm.clone(), 4)
            .run(vec![Message::user("notes on sorting please")], "sys", 0.7)
            .await
            .unwrap();

        let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(outcome.messages[2].text(), "notes on sorting");
        assert!(!outcome.messages[2].is_error);
        assert_eq!(outcome.final_text, "Here are your sorting notes.");

        let calls = llm.calls();
        assert_eq!(calls[0].tools, vec!["notes".to_string()]);
        assert_eq!(calls[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_errors_are_fed_back() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            MockReply::tool_call("notes", json!({})),
            MockReply::tool_call("teleport", json!({})),
            MockReply::text("Sorry, I could not fetch notes."),
        ]));
        let outcome = tool_loop(llm, 4)
            .run(vec![Message::user("notes?")], "", 0.7)
            .await
            .unwrap();
        assert!(outcome.messages[2].is_error);
        assert!(outcome.messages[2].text().starts_with("Error: "));
        assert!(outcome.messages[2].text().contains("missing topic"));
        assert!(outcome.messages[4].is_error);
        assert_eq!(outcome.messages[4].text(), "Error: unknown tool 'teleport'");
        assert_eq!(outcome.final_text, "Sorry, I could not fetch notes.");
    }

    #[tokio::test]
    async fn test_exhausted() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            MockReply::tool_call("notes", json!({"topic": "a"})),
            MockReply::tool_call("notes", json!({"topic": "b"})),
        ]));
        let err = tool_loop(llm, 2)
            .run(vec![Message::user("loop")], "", 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolLoopExhausted(2)));
    }

    #[tokio::test]
    async fn test_llm_error_propagates() {
        let llm = Arc::new(MockLlmClient::scripted(vec![MockReply::error("503")]));
        let err = tool_loop(llm, 2)
            .run(vec![Message::user("hi")], "", 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }
}
