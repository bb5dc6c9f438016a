//! 检索 Agent 的单步工具循环
//!
//! Ask -> Act (并发 Tool) -> Observe -> 下一轮 Ask，直到 Agent 给出纯文本小结、
//! 工具调用预算耗尽或达到最大轮数。每轮的 system prompt 都会重算，包含最新的工作候选列表。
//! 新论文只在 Observation 时与已知论文比对去重；整合与重排序由编排器在步骤结束后完成。

use std::sync::Arc;
use std::time::Duration;

use crate::core::state::{format_completed_steps, CompletedStep};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::{complete_with_timeout, LlmClient, Message};
use crate::papers::{CandidateSet, PaperRecord};
use crate::react::events::{ProgressSink, ProgressStatus};
use crate::react::planner::{parse_agent_turn, AgentTurn, ToolCall};
use crate::react::prompts;
use crate::tools::{tool_call_schema_json, SearchModality, ToolExecutor};

/// 单步预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    /// 本步骤最多执行的工具调用数（失败的调用也计入）
    pub tool_calls: usize,
    /// 本步骤最多询问 Agent 的轮数
    pub max_turns: usize,
}

/// 执行一个计划步骤所需的只读上下文
pub struct StepContext<'a> {
    pub task: &'a str,
    pub step: &'a str,
    pub upcoming: &'a [String],
    pub completed: &'a [CompletedStep],
    pub candidates: &'a CandidateSet,
}

/// 单步结果
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub summary: String,
    /// 本步骤新发现的论文（不含进入步骤前已在候选集中的）
    pub new_papers: Vec<PaperRecord>,
    pub tool_calls: usize,
    /// 按首次调用顺序去重
    pub tools_used: Vec<String>,
    /// 成功执行过的检索方式
    pub modalities: Vec<SearchModality>,
    pub turns: usize,
    pub budget_exhausted: bool,
    /// Agent 主动宣布本步骤完成
    pub finished_by_agent: bool,
}

impl StepOutcome {
    pub fn into_completed(self, step: &str) -> (CompletedStep, Vec<PaperRecord>) {
        let completed = CompletedStep {
            step: step.to_string(),
            summary: self.summary,
            tools_used: self.tools_used,
            modalities: Vec::new(),
            tool_calls: self.tool_calls,
            new_papers: self.new_papers.len(),
            budget_exhausted: self.budget_exhausted,
        }
        .with_modalities(self.modalities);
        (completed, self.new_papers)
    }
}

/// 检索 Agent：持有 LLM、工具执行器与恢复引擎
pub struct SearchAgent {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    recovery: RecoveryEngine,
    timeout: Duration,
    max_observation_chars: usize,
}

impl SearchAgent {
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>, timeout: Duration) -> Self {
        Self {
            llm,
            executor,
            recovery: RecoveryEngine::new(),
            timeout,
            max_observation_chars: 6000,
        }
    }

    pub fn with_max_observation_chars(mut self, n: usize) -> Self {
        self.max_observation_chars = n.max(200);
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub async fn run_step(
        &self,
        ctx: &StepContext<'_>,
        budget: StepBudget,
        progress: &ProgressSink,
    ) -> StepOutcome {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let tools_json = self.executor.registry().to_schema_json();
        let call_schema = tool_call_schema_json();

        let mut messages = vec![Message::user(prompts::executor_user(
            ctx.task,
            ctx.step,
            &format_completed_steps(ctx.completed),
        ))];
        let mut discovered = CandidateSet::new();
        let mut out = StepOutcome::default();
        let mut last_note = String::new();

        loop {
            if out.tool_calls >= budget.tool_calls {
                out.budget_exhausted = true;
                out.summary = closing_summary(
                    &last_note,
                    &format!(
                        "Tool-call budget of {} reached; {} new papers found in this step.",
                        budget.tool_calls,
                        discovered.len()
                    ),
                );
                tracing::info!(step = ctx.step, calls = out.tool_calls, "tool-call budget exhausted");
                break;
            }
            if out.turns >= budget.max_turns {
                out.summary = closing_summary(
                    &last_note,
                    &format!(
                        "Agent turn limit ({}) reached; {} new papers found in this step.",
                        budget.max_turns,
                        discovered.len()
                    ),
                );
                tracing::warn!(step = ctx.step, turns = out.turns, "agent turn limit reached");
                break;
            }
            out.turns += 1;

            let working = ctx.candidates.merge(discovered.as_slice());
            let system = prompts::search_agent_system(
                &today,
                &tools_json,
                &call_schema,
                ctx.upcoming,
                &working.render(false),
            );
            let mut full = vec![Message::system(system)];
            full.extend(messages.iter().cloned());

            let output = match complete_with_timeout(self.llm.as_ref(), &full, self.timeout).await {
                Ok(o) => o,
                Err(e) => {
                    let err = AgentError::from(e);
                    tracing::warn!(error = %err, "search agent oracle failed");
                    out.summary = match self.recovery.handle(&err) {
                        RecoveryAction::FinishStep(msg) => closing_summary(&last_note, &msg),
                        other => closing_summary(&last_note, &format!("{:?}", other)),
                    };
                    break;
                }
            };

            match parse_agent_turn(&output) {
                Ok(AgentTurn::Done { summary }) => {
                    out.finished_by_agent = true;
                    out.summary = if summary.is_empty() {
                        closing_summary(&last_note, &format!("{} new papers found in this step.", discovered.len()))
                    } else {
                        summary
                    };
                    break;
                }
                Ok(AgentTurn::ToolCalls { calls, note }) => {
                    if !note.is_empty() {
                        last_note = note;
                    }
                    messages.push(Message::assistant(output.clone()));

                    let remaining = budget.tool_calls - out.tool_calls;
                    let batch: &[ToolCall] = &calls[..calls.len().min(remaining)];
                    if batch.len() < calls.len() {
                        tracing::warn!(
                            requested = calls.len(),
                            allowed = batch.len(),
                            "tool calls truncated to remaining budget"
                        );
                    }
                    for call in batch {
                        progress.emit("Calling tool", ProgressStatus::Running, Some(call.tool.clone()));
                        if !out.tools_used.contains(&call.tool) {
                            out.tools_used.push(call.tool.clone());
                        }
                    }
                    out.tool_calls += batch.len();

                    for outcome in self.executor.execute_all(batch).await {
                        let observation = match outcome.result {
                            Ok(result) => {
                                let known = ctx.candidates.merge(discovered.as_slice());
                                let fresh = known.unseen(&result.papers);
                                discovered = discovered.merge(&fresh);
                                if let Some(m) = outcome.modality {
                                    if !out.modalities.contains(&m) {
                                        out.modalities.push(m);
                                    }
                                }
                                if result.papers.is_empty() {
                                    result.text
                                } else {
                                    format!("{}\n({} new papers added to the list)", result.text, fresh.len())
                                }
                            }
                            Err(e) => {
                                tracing::warn!(tool = %outcome.call.tool, error = %e, "tool failed");
                                match self.recovery.handle(&e) {
                                    RecoveryAction::TreatAsEmpty(msg) => msg,
                                    _ => format!("Error: {}", e),
                                }
                            }
                        };
                        messages.push(Message::user(format!(
                            "Observation from {}: {}",
                            outcome.call.tool,
                            truncate(&observation, self.max_observation_chars)
                        )));
                    }
                }
                Err(e) => {
                    // 格式错误：交给 Recovery 决定是否重试
                    match self.recovery.handle(&e) {
                        RecoveryAction::RetryWithPrompt(prompt) => {
                            tracing::debug!(error = %e, "agent output not parseable, retrying");
                            messages.push(Message::assistant(output.clone()));
                            messages.push(Message::user(prompt));
                        }
                        _ => {
                            out.summary = closing_summary(&last_note, &format!("Step ended early: {}", e));
                            break;
                        }
                    }
                }
            }
        }

        out.new_papers = discovered.into_vec();
        out
    }
}

fn closing_summary(note: &str, tail: &str) -> String {
    if note.trim().is_empty() {
        tail.to_string()
    } else {
        format!("{} {}", note.trim(), tail)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...[truncated]", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
