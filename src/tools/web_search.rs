//! Web 检索工具：搜索 + 抓取正文（Firecrawl）
//!
//! RetrievalClient 抽象「搜索返回标题与链接」「抓取单页 markdown」两步；FirecrawlClient 走 HTTP API，
//! 测试里可换成桩实现。WebSearchTool 把结果拼成
//! `Title: ...\nSource: ...\n<markdown>`，每个来源截断到 max_content_chars，来源之间空一行。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::RetrievalSection;
use crate::tools::schema::parameters_schema;
use crate::tools::Tool;

/// 搜索命中的一条来源
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// 检索能力：搜索 + 抓取
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// 搜索；请求失败时返回错误描述
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, String>;

    /// 抓取页面 markdown；失败或无正文时为 None
    async fn fetch_content(&self, url: &str) -> Option<String>;
}

/// Firecrawl HTTP 客户端（/v2/search、/v2/scrape）
pub struct FirecrawlClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FirecrawlClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// 从 [retrieval] 段创建；API Key 缺失不报错，调用时才以工具错误的形式返回
    pub fn from_config(cfg: &RetrievalSection) -> Self {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(env = %cfg.api_key_env, "retrieval API key not set, web search will be unavailable");
        }
        Self::new(&cfg.provider_url, api_key, cfg.timeout_secs)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "web search is unavailable: retrieval API key is not configured".to_string())?;
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request to {path} failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("{path} returned {status}: {}", truncate_chars(&text, 200)));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| format!("invalid response from {path}: {e}"))
    }
}

#[async_trait]
impl RetrievalClient for FirecrawlClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, String> {
        let body = self
            .post("/v2/search", json!({"query": query, "limit": limit}))
            .await?;
        Ok(parse_search_hits(&body))
    }

    async fn fetch_content(&self, url: &str) -> Option<String> {
        match self
            .post("/v2/scrape", json!({"url": url, "formats": ["markdown"]}))
            .await
        {
            Ok(body) => body
                .pointer("/data/markdown")
                .and_then(Value::as_str)
                .filter(|md| !md.trim().is_empty())
                .map(String::from),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "scrape failed");
                None
            }
        }
    }
}

/// 解析搜索结果；兼容 `data.web[]` 与旧版的 `data[]`
fn parse_search_hits(body: &Value) -> Vec<SearchHit> {
    let items = body
        .pointer("/data/web")
        .or_else(|| body.get("data"))
        .and_then(Value::as_array);
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let url = item.get("url")?.as_str()?.to_string();
                    let title = item
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or(url.as_str())
                        .to_string();
                    Some(SearchHit { title, url })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WebSearchInput {
    /// 要检索的主题或问题
    query: String,
}

/// 检索工具：搜索后逐个抓取正文
pub struct WebSearchTool {
    client: Arc<dyn RetrievalClient>,
    num_results: usize,
    max_content_chars: usize,
}

impl WebSearchTool {
    pub fn new(client: Arc<dyn RetrievalClient>, num_results: usize, max_content_chars: usize) -> Self {
        Self {
            client,
            num_results: num_results.max(1),
            max_content_chars,
        }
    }

    pub fn from_config(client: Arc<dyn RetrievalClient>, cfg: &RetrievalSection) -> Self {
        Self::new(client, cfg.num_results, cfg.max_content_chars)
    }

    /// 搜索并拼接正文；没有任何可用来源时返回固定提示
    pub async fn search_and_fetch(&self, query: &str) -> Result<String, String> {
        let hits = self.client.search(query, self.num_results).await?;
        let mut sections = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(markdown) = self.client.fetch_content(&hit.url).await else {
                continue;
            };
            sections.push(format!(
                "Title: {}\nSource: {}\n{}",
                hit.title,
                hit.url,
                truncate_chars(&markdown, self.max_content_chars)
            ));
        }
        if sections.is_empty() {
            return Ok("No relevant sources found.".to_string());
        }
        Ok(sections.join("\n\n"))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a topic and return the content of the most relevant pages (title, source URL, markdown)."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<WebSearchInput>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let input: WebSearchInput =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        if input.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        self.search_and_fetch(&input.query).await
    }
}
