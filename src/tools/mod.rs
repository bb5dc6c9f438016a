//! 工具箱：学术索引检索、引用图遍历、网页搜索，以及注册表与执行器

pub mod executor;
pub mod registry;
pub mod schema;
pub mod semantic_scholar;
pub mod snowball;
pub mod web_search;

use std::sync::Arc;

use crate::config::ToolsSection;

pub use executor::{ToolExecutor, ToolOutcome};
pub use registry::{SearchModality, Tool, ToolOutput, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use semantic_scholar::{S2GetPaperTool, S2SearchTool, SemanticScholarClient};
pub use snowball::{SnowballDirection, SnowballTool};
pub use web_search::WebSearchTool;

/// 按配置注册全部检索工具；没有 Tavily Key 时不注册网页搜索
pub fn default_registry(cfg: &ToolsSection) -> ToolRegistry {
    let s2 = Arc::new(SemanticScholarClient::new(
        &cfg.semantic_scholar,
        cfg.tool_timeout_secs,
    ));
    let mut registry = ToolRegistry::new();
    registry.register(S2SearchTool::new(s2.clone(), cfg.semantic_scholar.default_limit));
    registry.register(S2GetPaperTool::new(s2.clone()));
    registry.register(SnowballTool::forward(s2.clone(), cfg.semantic_scholar.snowball_limit));
    registry.register(SnowballTool::backward(s2, cfg.semantic_scholar.snowball_limit));
    match WebSearchTool::from_config(&cfg.web_search, cfg.tool_timeout_secs) {
        Some(tool) => registry.register(tool),
        None => tracing::warn!("TAVILY_API_KEY not set. Web search tool disabled."),
    }
    registry
}
