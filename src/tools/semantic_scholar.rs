//! Semantic Scholar 学术索引：关键词检索与按 id 获取论文
//!
//! 共享一个 SemanticScholarClient（reqwest），可选 x-api-key；没有 paperId 的记录一律丢弃。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SemanticScholarSection;
use crate::papers::PaperRecord;
use crate::tools::{SearchModality, Tool, ToolOutput};

pub const PAPER_FIELDS: &str = "paperId,title,abstract,year,publicationDate,authors,citationCount,\
influentialCitationCount,venue,isOpenAccess,url";

/// 单次检索返回上限（API 限制）
const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Graph API 客户端
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(cfg: &SemanticScholarSection, timeout_secs: u64) -> Self {
        let api_key = cfg
            .api_key
            .clone()
            .or_else(|| std::env::var("S2_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("corvus/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// {base}/{segments...}；每段单独做百分号编码，id 中的 `/`、`?` 不会改变路径
    pub fn endpoint_url(&self, segments: &[&str]) -> Result<Url, String> {
        if segments
            .iter()
            .any(|s| s.trim().is_empty() || s.chars().all(|c| c == '.'))
        {
            return Err(format!("Invalid path segment in {:?}", segments));
        }
        let mut url = Url::parse(&self.base_url).map_err(|e| format!("Invalid base URL: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| format!("Base URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET {base}/{segments...}，返回 JSON
    pub async fn get_json(&self, segments: &[&str], params: &[(&str, String)]) -> Result<Value, String> {
        let url = self.endpoint_url(segments)?;
        let mut req = self.client.get(url).query(params);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| format!("Invalid JSON: {}", e))
    }

    pub async fn search(&self, params: &[(&str, String)]) -> Result<Vec<PaperRecord>, String> {
        let body = self.get_json(&["paper", "search"], params).await?;
        let parsed: SearchResponse =
            serde_json::from_value(body).map_err(|e| format!("Unexpected payload: {}", e))?;
        Ok(parse_records(parsed.data))
    }

    pub async fn paper(&self, paper_id: &str) -> Result<Option<PaperRecord>, String> {
        let body = self
            .get_json(&["paper", paper_id], &[("fields", PAPER_FIELDS.to_string())])
            .await?;
        Ok(parse_records(vec![body]).into_iter().next())
    }
}

/// 将 JSON 数组解析为 PaperRecord，跳过无法解析或缺少 paperId 的项
pub fn parse_records(items: Vec<Value>) -> Vec<PaperRecord> {
    items
        .into_iter()
        .filter_map(|v| serde_json::from_value::<PaperRecord>(v).ok())
        .filter(|p| !p.paper_id.trim().is_empty())
        .collect()
}

/// 工具 Observation：列出返回的论文
pub fn describe_papers(papers: &[PaperRecord]) -> String {
    if papers.is_empty() {
        return "No papers returned.".to_string();
    }
    let lines: Vec<String> = papers
        .iter()
        .map(|p| {
            format!(
                "- {} ({}) [paperId: {}] citations: {}",
                p.title_or_default(),
                p.published(),
                p.paper_id,
                p.citation_count.map(|c| c.to_string()).unwrap_or_else(|| "?".into())
            )
        })
        .collect();
    format!("Returned {} papers:\n{}", papers.len(), lines.join("\n"))
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// s2_search_papers：关键词 + 过滤条件检索
pub struct S2SearchTool {
    client: Arc<SemanticScholarClient>,
    default_limit: usize,
}

impl S2SearchTool {
    pub fn new(client: Arc<SemanticScholarClient>, default_limit: usize) -> Self {
        Self {
            client,
            default_limit,
        }
    }

    /// 将工具参数转换为 API 查询参数
    pub fn query_params(&self, args: &Value) -> Result<Vec<(&'static str, String)>, String> {
        let query = str_arg(args, "query").ok_or_else(|| "Missing query".to_string())?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_SEARCH_LIMIT);

        let mut params = vec![
            ("query", query.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(year) = str_arg(args, "year") {
            params.push(("year", year.to_string()));
        } else if let Some(year) = args.get("year").and_then(Value::as_u64) {
            params.push(("year", year.to_string()));
        }
        if let Some(min) = args.get("min_citation_count").and_then(Value::as_u64) {
            params.push(("minCitationCount", min.to_string()));
        }
        if let Some(fields) = str_arg(args, "fields_of_study") {
            params.push(("fieldsOfStudy", fields.to_string()));
        }
        if let Some(venue) = str_arg(args, "venue") {
            params.push(("venue", venue.to_string()));
        }
        if args
            .get("open_access_only")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            params.push(("openAccessPdf", String::new()));
        }
        Ok(params)
    }
}

#[async_trait]
impl Tool for S2SearchTool {
    fn name(&self) -> &str {
        "s2_search_papers"
    }

    fn description(&self) -> &str {
        "Search the Semantic Scholar academic database (200M+ papers) by keyword, title or author name, \
         with optional filters. Returned papers are added to the paper list."
    }

    fn modality(&self) -> SearchModality {
        SearchModality::IndexSearch
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Keywords, title or author name"},
                "year": {"type": "string", "description": "\"2023\", \"2020-2024\" or open range \"2022-\""},
                "min_citation_count": {"type": "integer"},
                "fields_of_study": {"type": "string", "description": "Comma-separated, e.g. \"Computer Science,Mathematics\""},
                "venue": {"type": "string", "description": "Comma-separated venue names, e.g. \"NeurIPS,ICML\""},
                "open_access_only": {"type": "boolean"},
                "limit": {"type": "integer", "maximum": MAX_SEARCH_LIMIT}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let params = self.query_params(&args)?;
        tracing::info!(query = %params[0].1, "s2 search");
        let papers = self.client.search(&params).await?;
        Ok(ToolOutput {
            text: describe_papers(&papers),
            papers,
        })
    }
}

/// s2_get_paper：按 Semantic Scholar id 获取单篇论文
pub struct S2GetPaperTool {
    client: Arc<SemanticScholarClient>,
}

impl S2GetPaperTool {
    pub fn new(client: Arc<SemanticScholarClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for S2GetPaperTool {
    fn name(&self) -> &str {
        "s2_get_paper"
    }

    fn description(&self) -> &str {
        "Fetch full metadata for one paper by its Semantic Scholar paper ID and add it to the paper list."
    }

    fn modality(&self) -> SearchModality {
        SearchModality::IndexSearch
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"paper_id": {"type": "string"}},
            "required": ["paper_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let id = str_arg(&args, "paper_id").ok_or_else(|| "Missing paper_id".to_string())?;
        let papers: Vec<PaperRecord> = self.client.paper(id).await?.into_iter().collect();
        Ok(ToolOutput {
            text: describe_papers(&papers),
            papers,
        })
    }
}
