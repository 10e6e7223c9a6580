//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini、OpenAI、自建代理均可。
//! 请求体按 chat-completions 线格式拼成 JSON 再转为 async_openai 的请求类型，
//! 这样 tool / tool_calls 消息的映射只在本文件的两个函数里。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{CreateChatCompletionRequest, CreateChatCompletionResponse};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError, LlmTurn, ToolSpec};
use crate::memory::{Message, MessageContent, Role, ToolCall};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        system: &str,
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system.trim().is_empty() {
            wire.push(json!({"role": "system", "content": system}));
        }
        wire.extend(messages.iter().map(to_wire_message));

        let mut body = json!({
            "model": self.model,
            "messages": wire,
            "temperature": temperature,
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
        }

        serde_json::from_value(body).map_err(|e| LlmError::InvalidResponse(format!("request: {e}")))
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<LlmTurn, LlmError> {
        let response: CreateChatCompletionResponse = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let value = serde_json::to_value(&response)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = value.get("usage") {
            self.usage.add(
                usage["prompt_tokens"].as_u64().unwrap_or(0),
                usage["completion_tokens"].as_u64().unwrap_or(0),
            );
        }

        parse_turn(&value)
    }
}

/// 服务端返回的错误体映射为 Api，其余（网络、解码）为 Request
fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(api) => LlmError::Api {
            code: api
                .code
                .or(api.r#type)
                .unwrap_or_else(|| "unknown".to_string()),
            message: api.message,
        },
        other => LlmError::Request(other.to_string()),
    }
}

/// 内部消息 -> chat-completions 线格式
fn to_wire_message(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.text()}),
        Role::User => json!({"role": "user", "content": msg.text()}),
        Role::Assistant if msg.has_tool_calls() => {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.args.to_string()},
                    })
                })
                .collect();
            let text = msg.text();
            let content = if text.is_empty() { Value::Null } else { Value::String(text) };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        Role::Assistant => json!({"role": "assistant", "content": msg.text()}),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.text(),
        }),
    }
}

/// 从响应 JSON 中取首个 choice 的文本与工具调用
fn parse_turn(response: &Value) -> Result<LlmTurn, LlmError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

    let content = match message.get("content") {
        Some(Value::String(s)) => MessageContent::Text(s.clone()),
        Some(v @ Value::Array(_)) => serde_json::from_value(v.clone())
            .map_err(|e| LlmError::InvalidResponse(format!("content blocks: {e}")))?,
        _ => MessageContent::default(),
    };

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    let function = c.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let raw_args = function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                    let args = serde_json::from_str(raw_args)
                        .unwrap_or_else(|_| Value::String(raw_args.to_string()));
                    let id = c
                        .get("id")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .unwrap_or_else(|| format!("call_{i}"));
                    Some(ToolCall { id, name, args })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(LlmTurn { content, tool_calls })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        messages: &[Message],
        system: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = self.build_request(messages, system, &[], temperature)?;
        let turn = self.send(request).await?;
        Ok(turn.content.text())
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        system: &str,
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<LlmTurn, LlmError> {
        let request = self.build_request(messages, system, tools, temperature)?;
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_code() {
        let api = serde_json::from_value(json!({
            "message": "You exceeded your current quota",
            "type": "insufficient_quota",
            "param": null,
            "code": null
        }))
        .unwrap();
        let err = map_openai_error(OpenAIError::ApiError(api));
        assert_eq!(
            err,
            LlmError::Api {
                code: "insufficient_quota".into(),
                message: "You exceeded your current quota".into(),
            }
        );

        let other = map_openai_error(OpenAIError::InvalidArgument("bad model".into()));
        assert!(matches!(other, LlmError::Request(m) if m.contains("bad model")));
    }

    #[test]
    fn test_wire_message_for_tool_traffic() {
        let call = ToolCall {
            id: "call_9".into(),
            name: "explainer".into(),
            args: json!({"message": "recursion"}),
        };
        let assistant = Message::assistant_tool_calls(MessageContent::default(), vec![call]);
        let wire = to_wire_message(&assistant);
        assert_eq!(wire["role"], "assistant");
        assert!(wire["content"].is_null());
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "explainer");
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"],
            r#"{"message":"recursion"}"#
        );

        let result = to_wire_message(&Message::tool_result("call_9", "explainer", "done"));
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "call_9");
    }

    #[test]
    fn test_parse_turn_with_tool_calls() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "abc",
                        "type": "function",
                        "function": {"name": "learner", "arguments": "{\"message\":\"graphs\"}"}
                    }]
                }
            }]
        });
        let turn = parse_turn(&response).unwrap();
        assert!(turn.content.is_blank());
        assert_eq!(turn.tool_calls[0].id, "abc");
        assert_eq!(turn.tool_calls[0].args["message"], "graphs");
    }

    #[test]
    fn test_parse_turn_text_and_missing_choices() {
        let turn = parse_turn(&json!({"choices": [{"message": {"content": "hi"}}]})).unwrap();
        assert_eq!(turn.content.text(), "hi");
        assert!(turn.tool_calls.is_empty());
        assert!(parse_turn(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_build_request_includes_tools() {
        let client = OpenAiClient::new(Some("http://localhost:1"), "gemini-2.5-flash", "k");
        let tools = vec![ToolSpec {
            name: "explainer".into(),
            description: "Explain a concept".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let request = client
            .build_request(&[Message::user("hi")], "be brief", &tools, 0.7)
            .unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["tools"][0]["function"]["name"], "explainer");
    }
}
