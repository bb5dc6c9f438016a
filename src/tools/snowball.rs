//! 引用图遍历（snowball）
//!
//! - forward_snowball：引用了种子论文的后续工作（/citations，citingPaper）
//! - backward_snowball：种子论文引用的参考文献（/references，citedPaper）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::papers::PaperRecord;
use crate::tools::semantic_scholar::{describe_papers, parse_records, SemanticScholarClient};
use crate::tools::{SearchModality, Tool, ToolOutput};

const SNOWBALL_FIELDS: [&str; 7] = [
    "paperId",
    "title",
    "abstract",
    "year",
    "authors",
    "citationCount",
    "influentialCitationCount",
];

/// 单次遍历返回上限（API 限制）
const MAX_SNOWBALL_LIMIT: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnowballDirection {
    /// 引用种子论文的论文
    Forward,
    /// 种子论文引用的论文
    Backward,
}

impl SnowballDirection {
    fn endpoint(self) -> &'static str {
        match self {
            Self::Forward => "citations",
            Self::Backward => "references",
        }
    }

    fn nested_key(self) -> &'static str {
        match self {
            Self::Forward => "citingPaper",
            Self::Backward => "citedPaper",
        }
    }

    /// API fields 参数：每个字段加上嵌套前缀
    pub fn fields_param(self) -> String {
        SNOWBALL_FIELDS
            .iter()
            .map(|f| format!("{}.{}", self.nested_key(), f))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// 从 {"data": [{"citingPaper": {...}}]} 中取出论文
    pub fn extract(self, body: &Value) -> Vec<PaperRecord> {
        let items = body
            .get("data")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|item| item.get(self.nested_key()).cloned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        parse_records(items)
    }
}

pub struct SnowballTool {
    client: Arc<SemanticScholarClient>,
    direction: SnowballDirection,
    default_limit: usize,
}

impl SnowballTool {
    pub fn forward(client: Arc<SemanticScholarClient>, default_limit: usize) -> Self {
        Self {
            client,
            direction: SnowballDirection::Forward,
            default_limit,
        }
    }

    pub fn backward(client: Arc<SemanticScholarClient>, default_limit: usize) -> Self {
        Self {
            client,
            direction: SnowballDirection::Backward,
            default_limit,
        }
    }
}

#[async_trait]
impl Tool for SnowballTool {
    fn name(&self) -> &str {
        match self.direction {
            SnowballDirection::Forward => "forward_snowball",
            SnowballDirection::Backward => "backward_snowball",
        }
    }

    fn description(&self) -> &str {
        match self.direction {
            SnowballDirection::Forward => {
                "Find papers that CITE a seed paper (recent work building on it). Use only when the goal asks for citing/related papers."
            }
            SnowballDirection::Backward => {
                "Find papers that a seed paper CITES (its foundations/references). Use only when the goal asks for cited/related papers."
            }
        }
    }

    fn modality(&self) -> SearchModality {
        SearchModality::CitationChase
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paper_id": {"type": "string", "description": "Semantic Scholar paper ID of the seed paper (from the paper list)"},
                "limit": {"type": "integer", "maximum": MAX_SNOWBALL_LIMIT}
            },
            "required": ["paper_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let id = args
            .get("paper_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Missing paper_id".to_string())?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_SNOWBALL_LIMIT);

        let body = self
            .client
            .get_json(
                &["paper", id, self.direction.endpoint()],
                &[
                    ("fields", self.direction.fields_param()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let papers = self.direction.extract(&body);
        Ok(ToolOutput {
            text: describe_papers(&papers),
            papers,
        })
    }
}
