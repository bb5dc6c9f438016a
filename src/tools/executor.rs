//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(call) 在超时内调用工具，
//! 超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed / HallucinatedTool）；
//! 每次调用输出结构化审计日志（JSON）。
//! execute_all 对同一轮的多个调用并发分发，结果按调用发出的顺序返回（与到达顺序无关）。

use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::time::timeout;

use crate::core::AgentError;
use crate::react::ToolCall;
use crate::tools::{SearchModality, ToolOutput, ToolRegistry};

/// 单个工具调用的结果
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call: ToolCall,
    pub modality: Option<SearchModality>,
    pub result: Result<ToolOutput, AgentError>,
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    max_concurrent: usize,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            max_concurrent: 4,
        }
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, AgentError> {
        let tool = self
            .registry
            .get(&call.tool)
            .ok_or_else(|| AgentError::HallucinatedTool(call.tool.clone()))?;

        let start = Instant::now();
        let result = timeout(self.timeout, tool.execute(call.args.clone())).await;

        let (ok, outcome, papers) = match &result {
            Ok(Ok(out)) => (true, "ok", out.papers.len()),
            Ok(Err(_)) => (false, "error", 0),
            Err(_) => (false, "timeout", 0),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.tool,
            "ok": ok,
            "outcome": outcome,
            "papers": papers,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(format!("{}: {}", call.tool, e))),
            Err(_) => Err(AgentError::ToolTimeout(call.tool.clone())),
        }
    }

    /// 并发执行一批调用（上限 max_concurrent），结果顺序与 calls 一致
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        stream::iter(calls.iter().cloned())
            .map(|call| async move {
                let result = self.execute(&call).await;
                ToolOutcome {
                    modality: self.registry.modality_of(&call.tool),
                    call,
                    result,
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::papers::PaperRecord;
    use crate::tools::Tool;

    /// 按 args.delay_ms 休眠后返回 args.id 对应的一篇论文
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        fn modality(&self) -> SearchModality {
            SearchModality::IndexSearch
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
            let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let id = args.get("id").and_then(Value::as_str).unwrap_or("?");
            if id == "fail" {
                return Err("backend down".to_string());
            }
            Ok(ToolOutput::papers(vec![PaperRecord::new(id, id)]))
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(SlowTool);
        ToolExecutor::new(reg, timeout_secs)
    }

    fn call(id: &str, delay_ms: u64) -> ToolCall {
        ToolCall {
            tool: "slow".to_string(),
            args: json!({"id": id, "delay_ms": delay_ms}),
        }
    }

    #[tokio::test]
    async fn test_execute_all_keeps_issue_order() {
        let exec = executor(5);
        let outcomes = exec
            .execute_all(&[call("first", 60), call("second", 0), call("third", 20)])
            .await;
        let ids: Vec<String> = outcomes
            .iter()
            .map(|o| o.result.as_ref().unwrap().papers[0].paper_id.clone())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_hallucinated() {
        let exec = executor(5);
        let err = exec
            .execute(&ToolCall {
                tool: "nope".to_string(),
                args: json!({}),
            })
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::HallucinatedTool("nope".to_string()));
    }

    #[tokio::test]
    async fn test_tool_error_maps_to_execution_failed() {
        let exec = executor(5);
        let err = exec.execute(&call("fail", 0)).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed(msg) if msg.contains("backend down")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout() {
        let exec = executor(1);
        let err = exec.execute(&call("late", 5_000)).await.unwrap_err();
        assert_eq!(err, AgentError::ToolTimeout("slow".to_string()));
    }
}
