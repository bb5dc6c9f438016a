//! Planner：生成检索计划，以及 LLM 输出解析（Tool Call / 结构化 JSON）
//!
//! extract_json 从文本中提取 JSON 块（```json ... ``` 或最外层花括号）；
//! parse_agent_turn 把检索 Agent 的一轮输出解析为工具调用批次或「本步骤完成」；
//! Planner::plan 只调用一次 LLM，失败或输出无效时回退到固定的两步计划。

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::state::Plan;
use crate::core::AgentError;
use crate::llm::{complete_with_timeout, LlmClient, Message};
use crate::papers::CandidateSet;
use crate::react::prompts;

/// LLM 返回的 Tool Call（{"tool": "s2_search_papers", "args": {"query": "..."}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// 检索 Agent 一轮输出
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurn {
    /// 本轮要执行的工具调用（同一轮内并发）
    ToolCalls { calls: Vec<ToolCall>, note: String },
    /// 不再调用工具，附带步骤小结
    Done { summary: String },
}

/// 回退计划：不依赖 LLM，保证总能开始执行
pub const FALLBACK_PLAN: [&str; 2] = [
    "Use web search to understand the research topic",
    "Search academic database for relevant papers",
];

/// 重规划器没有给出可用步骤时使用的通用步骤
pub const GENERIC_STEP: &str = "Search for more relevant papers";

pub fn fallback_plan() -> Plan {
    Plan::new(FALLBACK_PLAN.iter().map(|s| s.to_string()).collect())
}

/// 非检索动作（review / filter / select / compare ...）不作为计划步骤
pub fn is_meta_step(step: &str) -> bool {
    let lower = step.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    const META_PREFIXES: [&str; 13] = [
        "review",
        "read",
        "filter",
        "select",
        "compare",
        "rank",
        "rerank",
        "analyze",
        "analyse",
        "summarize",
        "summarise",
        "evaluate",
        "compile",
    ];
    let searchy = ["search", "find", "retrieve", "snowball", "look up", "fetch", "query"];
    let first = lower.split_whitespace().next().unwrap_or("");
    META_PREFIXES.contains(&first) && !searchy.iter().any(|w| lower.contains(w))
}

/// 提取 JSON 块；没有花括号时返回 None
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 把 LLM 输出解析为结构化对象
pub fn parse_structured<T: DeserializeOwned>(output: &str) -> Result<T, AgentError> {
    let json_str = extract_json(output)
        .ok_or_else(|| AgentError::JsonParseError(format!("no JSON object: {}", preview(output))))?;
    serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, preview(json_str))))
}

/// 解析检索 Agent 的一轮输出
///
/// 支持 {"tool_calls": [...]}、单个 {"tool", "args"}、{"done": true, "summary"}；
/// 没有 JSON 的纯文本视为完成。看起来像 JSON 却解析失败时返回 JsonParseError。
pub fn parse_agent_turn(output: &str) -> Result<AgentTurn, AgentError> {
    let trimmed = output.trim();
    let Some(json_str) = extract_json(trimmed) else {
        return Ok(AgentTurn::Done {
            summary: trimmed.to_string(),
        });
    };

    let value: Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => {
            if looks_like_call(trimmed) {
                return Err(AgentError::JsonParseError(format!("{}: {}", e, preview(json_str))));
            }
            return Ok(AgentTurn::Done {
                summary: trimmed.to_string(),
            });
        }
    };

    let note = value
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    if value.get("done").and_then(Value::as_bool) == Some(true) {
        return Ok(AgentTurn::Done { summary: note });
    }

    if let Some(calls) = value.get("tool_calls") {
        let calls: Vec<ToolCall> = serde_json::from_value(calls.clone())
            .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, preview(json_str))))?;
        let calls: Vec<ToolCall> = calls.into_iter().filter(|c| !c.tool.trim().is_empty()).collect();
        if calls.is_empty() {
            return Ok(AgentTurn::Done { summary: note });
        }
        return Ok(AgentTurn::ToolCalls { calls, note });
    }

    if value.get("tool").is_some() {
        let call: ToolCall = serde_json::from_value(value.clone())
            .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, preview(json_str))))?;
        if call.tool.trim().is_empty() {
            return Ok(AgentTurn::Done { summary: note });
        }
        return Ok(AgentTurn::ToolCalls {
            calls: vec![call],
            note,
        });
    }

    if looks_like_call(trimmed) {
        return Err(AgentError::JsonParseError(format!(
            "expected \"tool_calls\": {}",
            preview(json_str)
        )));
    }
    Ok(AgentTurn::Done {
        summary: trimmed.to_string(),
    })
}

fn looks_like_call(text: &str) -> bool {
    text.starts_with('{') || text.contains("```json") || text.contains("\"tool")
}

fn preview(s: &str) -> String {
    s.chars().take(200).collect()
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    #[serde(default)]
    plan_reasoning: String,
    #[serde(default)]
    plan_steps: Vec<String>,
}

/// 规划结果
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutput {
    pub plan: Plan,
    pub reasoning: String,
    pub used_fallback: bool,
}

/// Planner：一次 LLM 调用，无重试
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// 生成初始计划；永远返回非空计划
    pub async fn plan(&self, task: &str, candidates: &CandidateSet) -> PlanOutput {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let messages = vec![
            Message::system(prompts::planner_system(&today)),
            Message::user(prompts::planner_user(task, &candidates.render(true))),
        ];

        let output = match complete_with_timeout(self.llm.as_ref(), &messages, self.timeout).await {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, "planner oracle failed, using fallback plan");
                return Self::fallback(format!("Planner unavailable ({e}); using default plan."));
            }
        };

        let parsed: PlanResponse = match parse_structured(&output) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "planner output invalid, using fallback plan");
                return Self::fallback(format!("Planner output invalid ({e}); using default plan."));
            }
        };

        let steps: Vec<String> = parsed
            .plan_steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !is_meta_step(s))
            .collect();
        if steps.is_empty() {
            tracing::warn!("planner returned no executable steps, using fallback plan");
            return Self::fallback("Planner returned no executable steps; using default plan.".to_string());
        }

        tracing::info!(steps = steps.len(), "plan created");
        PlanOutput {
            plan: Plan::new(steps),
            reasoning: parsed.plan_reasoning,
            used_fallback: false,
        }
    }

    fn fallback(reasoning: String) -> PlanOutput {
        PlanOutput {
            plan: fallback_plan(),
            reasoning,
            used_fallback: true,
        }
    }
}
