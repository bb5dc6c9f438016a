//! 工具调用 JSON Schema 生成（schemars）
//!
//! 将「合法 tool call」的 JSON 结构注入检索 Agent 的 system prompt，减少 LLM 输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 单个工具调用（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 s2_search_papers、forward_snowball
    pub tool: String,
    /// 工具参数，依工具不同而不同（query、paper_id、year、limit 等）
    pub args: HashMap<String, serde_json::Value>,
}

/// 一轮 Agent 输出：要执行的工具调用列表（可并发执行）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct AgentTurnFormat {
    pub tool_calls: Vec<ToolCallFormat>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(AgentTurnFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mentions_fields() {
        let s = tool_call_schema_json();
        assert!(s.contains("tool_calls"));
        assert!(s.contains("\"tool\""));
        assert!(s.contains("\"args\""));
    }
}
