//! 网页搜索（Tavily）：了解研究背景、发现知名论文
//!
//! 只返回文本。网页摘要里提到的论文不会进入候选集，必须再用学术索引检索才算「已检索」。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::WebSearchSection;
use crate::tools::{SearchModality, Tool, ToolOutput};

/// 单条网页结果正文的最大字符数
const MAX_CONTENT_CHARS: usize = 800;

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Deserialize, Default)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

impl WebSearchTool {
    /// 没有 API Key 时返回 None（不注册该工具）
    pub fn from_config(cfg: &WebSearchSection, timeout_secs: u64) -> Option<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .or_else(|| std::env::var("TAVILY_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Some(Self {
            client,
            endpoint: format!("{}/search", cfg.base_url.trim_end_matches('/')),
            api_key,
            max_results: cfg.max_results.max(1),
        })
    }
}

fn render_overview(resp: &TavilyResponse) -> String {
    let mut out = String::new();
    if let Some(answer) = resp.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        out.push_str("Overview: ");
        out.push_str(answer.trim());
        out.push_str("\n\n");
    }
    if resp.results.is_empty() {
        out.push_str("No web results.");
        return out;
    }
    out.push_str("Sources:\n");
    for r in &resp.results {
        let content: String = r.content.chars().take(MAX_CONTENT_CHARS).collect();
        out.push_str(&format!("- {} ({})\n  {}\n", r.title, r.url, content.trim()));
    }
    out.push_str("\nNote: papers named above are NOT in the paper list until retrieved with an academic search tool.");
    out
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "tavily_research_overview"
    }

    fn description(&self) -> &str {
        "General web search to understand a research topic and identify well-known papers. \
         Does NOT add papers to the paper list."
    }

    fn modality(&self) -> SearchModality {
        SearchModality::WebSearch
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "Missing query".to_string())?;
        tracing::info!(query = %query, "web search");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest {
                query,
                search_depth: "advanced",
                include_answer: true,
                max_results: self.max_results,
            })
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid JSON: {}", e))?;
        Ok(ToolOutput::text(render_overview(&parsed)))
    }
}
