//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / modality / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并统一转 AgentError。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::papers::PaperRecord;

/// 检索方式：网页搜索 / 学术索引 / 引用图遍历
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchModality {
    WebSearch,
    IndexSearch,
    CitationChase,
}

/// 工具输出：给 Agent 看的文本 + 检索到的论文（网页搜索永远为空）
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub text: String,
    pub papers: Vec<PaperRecord>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            papers: Vec::new(),
        }
    }

    pub fn papers(papers: Vec<PaperRecord>) -> Self {
        Self {
            text: String::new(),
            papers,
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、检索方式、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    fn modality(&self) -> SearchModality;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>；BTreeMap 保证 prompt 中工具顺序稳定
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn modality_of(&self, name: &str) -> Option<SearchModality> {
        self.tools.get(name).map(|t| t.modality())
    }

    /// 已注册工具覆盖的检索方式
    pub fn modalities(&self) -> BTreeSet<SearchModality> {
        self.tools.values().map(|t| t.modality()).collect()
    }

    /// 动态生成工具 schema JSON，拼入 Agent 的 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl Tool for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        fn modality(&self) -> SearchModality {
            SearchModality::IndexSearch
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput, String> {
            Ok(ToolOutput::text("ok"))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = ToolRegistry::new();
        reg.register(Dummy);
        assert!(reg.get("dummy").is_some());
        assert!(reg.get("missing").is_none());
        assert_eq!(reg.modality_of("dummy"), Some(SearchModality::IndexSearch));
        let schema = reg.to_schema_json();
        assert!(schema.contains("\"dummy\""));
        assert!(schema.contains("does nothing"));
    }
}
