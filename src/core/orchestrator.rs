//! 主控编排：计划 -> 执行 -> 重规划 状态机
//!
//! PLANNING -> EXECUTING -> REPLANNING -> {EXECUTING | DONE}。
//! 每个阶段调用一个组件（Planner / SearchAgent / Replanner），组件只读状态并返回新值，
//! 由编排器写回 OrchestrationState。每次执行步骤后整合候选集（合并去重 + 重排序 + 截断）。
//! 迭代次数达到 max_iter 时无论目标是否达成都结束，保证终止。
//!
//! fast 模式没有规划 / 重规划阶段：每一步都是「继续为任务检索」，Agent 主动宣布完成即视为达成。

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AppConfig, FinderSection, ModeSection};
use crate::core::state::{FinderOutcome, FinderRequest, OrchestrationState, Plan, RunPhase};
use crate::core::AgentError;
use crate::llm::{create_deepseek_client, LlmClient, OpenAiClient};
use crate::papers::{consolidate, RerankerHandle};
use crate::react::events::{ProgressEvent, ProgressSink, ProgressStatus};
use crate::react::goal::GoalPolicy;
use crate::react::loop_::{SearchAgent, StepBudget, StepContext};
use crate::react::planner::{Planner, GENERIC_STEP};
use crate::react::replanner::{ReplanInput, Replanner};
use crate::tools::{default_registry, SearchModality, ToolExecutor};

/// 编排模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinderMode {
    /// 计划 - 执行 - 重规划
    Deliberate,
    /// 单一连续工具循环，无独立规划阶段
    Fast,
}

impl FromStr for FinderMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deliberate" | "full" => Ok(Self::Deliberate),
            "fast" => Ok(Self::Fast),
            other => Err(AgentError::ConfigError(format!("unknown finder mode: {other}"))),
        }
    }
}

/// 一次运行的数值预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinderSettings {
    pub max_iter: usize,
    pub max_list_length: usize,
    pub budget: StepBudget,
}

impl FinderSettings {
    pub fn for_mode(cfg: &FinderSection, mode: FinderMode) -> Self {
        let preset: &ModeSection = match mode {
            FinderMode::Deliberate => &cfg.deliberate,
            FinderMode::Fast => &cfg.fast,
        };
        Self {
            max_iter: preset.max_iter.max(1),
            max_list_length: preset.max_list_length.max(1),
            budget: StepBudget {
                tool_calls: preset.tool_call_budget,
                max_turns: cfg.max_agent_turns.max(1),
            },
        }
    }
}

struct PlanningStage {
    planner: Planner,
    replanner: Replanner,
}

/// 论文检索器：持有各组件，`run` 可并发调用（每次运行独立状态）
pub struct PaperFinder {
    agent: SearchAgent,
    reranker: RerankerHandle,
    settings: FinderSettings,
    planning: Option<PlanningStage>,
    available: BTreeSet<SearchModality>,
}

impl PaperFinder {
    /// fast 模式检索器；调用 `with_planning` 切换为 deliberate
    pub fn new(agent: SearchAgent, reranker: RerankerHandle, settings: FinderSettings) -> Self {
        let available = agent.executor().registry().modalities();
        Self {
            agent,
            reranker,
            settings,
            planning: None,
            available,
        }
    }

    pub fn with_planning(mut self, planner: Planner, replanner: Replanner) -> Self {
        self.planning = Some(PlanningStage { planner, replanner });
        self
    }

    pub fn mode(&self) -> FinderMode {
        if self.planning.is_some() {
            FinderMode::Deliberate
        } else {
            FinderMode::Fast
        }
    }

    /// 运行一次检索；只有输入非法时返回错误，组件失败一律降级
    pub async fn run(
        &self,
        request: FinderRequest,
        events: Option<&UnboundedSender<ProgressEvent>>,
    ) -> Result<FinderOutcome, AgentError> {
        let task = request.task.trim().to_string();
        if task.is_empty() {
            return Err(AgentError::InvalidTask("task is empty".to_string()));
        }
        let tracking_id = Uuid::new_v4().to_string();
        let progress = ProgressSink::new(tracking_id.clone(), events.cloned());
        let state = OrchestrationState::new(tracking_id.clone(), task, request.focus_query.trim().to_string());

        let span = tracing::info_span!("paper_finder", tracking_id = %tracking_id, mode = ?self.mode());
        let state = self.drive(state, &progress).instrument(span).await;
        Ok(state.into_outcome())
    }

    async fn drive(&self, mut state: OrchestrationState, progress: &ProgressSink) -> OrchestrationState {
        tracing::info!(task = %state.task, "search started");
        loop {
            match state.phase {
                RunPhase::Planning => {
                    self.plan(&mut state, progress).await;
                    state.phase = RunPhase::Executing;
                }
                RunPhase::Executing => {
                    self.execute(&mut state, progress).await;
                    state.phase = RunPhase::Replanning;
                }
                RunPhase::Replanning => {
                    state.phase = self.replan(&mut state, progress).await;
                }
                RunPhase::Done => break,
            }
        }
        tracing::info!(
            iterations = state.iteration,
            papers = state.candidates.len(),
            goal_achieved = state.goal_achieved,
            "search finished"
        );
        progress.emit(
            "Search complete",
            ProgressStatus::Complete,
            Some(format!(
                "Found {} papers in {} steps (goal achieved: {})",
                state.candidates.len(),
                state.iteration,
                state.goal_achieved
            )),
        );
        state
    }

    async fn plan(&self, state: &mut OrchestrationState, progress: &ProgressSink) {
        let Some(stage) = &self.planning else {
            state.plan = Plan::new(vec![fast_step(&state.task, false)]);
            state.plan_reasoning = "Fast mode: continuous search without a separate planning stage.".to_string();
            return;
        };
        progress.emit("Planning search strategy", ProgressStatus::Running, None);
        let out = stage.planner.plan(&state.task, &state.candidates).await;
        state.plan = out.plan;
        state.plan_reasoning = out.reasoning;
        state.used_fallback_plan = out.used_fallback;
        let status = if out.used_fallback {
            ProgressStatus::Degraded
        } else {
            ProgressStatus::Complete
        };
        progress.emit(
            "Planning search strategy",
            status,
            Some(format!("{} steps: {}", state.plan.len(), state.plan.steps().join(" | "))),
        );
    }

    async fn execute(&self, state: &mut OrchestrationState, progress: &ProgressSink) {
        let step = state.plan.current().unwrap_or(GENERIC_STEP).to_string();
        progress.emit("Searching", ProgressStatus::Running, Some(step.clone()));

        let outcome = {
            let ctx = StepContext {
                task: &state.task,
                step: &step,
                upcoming: state.plan.upcoming(),
                completed: &state.completed_steps,
                candidates: &state.candidates,
            };
            self.agent.run_step(&ctx, self.settings.budget, progress).await
        };
        let finished_by_agent = outcome.finished_by_agent;
        let (mut completed, new_papers) = outcome.into_completed(&step);

        let merged = consolidate(
            &state.candidates,
            &new_papers,
            &state.focus_query,
            &self.reranker,
            self.settings.max_list_length,
        )
        .await;
        completed.new_papers = merged.added;
        state.candidates = merged.candidates;
        state.completed_steps.push(completed);
        state.iteration += 1;
        if self.planning.is_none() {
            state.goal_achieved = finished_by_agent;
        }

        progress.emit(
            "Searching",
            ProgressStatus::Complete,
            Some(format!(
                "{} new papers, {} in list{}",
                merged.added,
                state.candidates.len(),
                if merged.reranked { " (reranked)" } else { "" }
            )),
        );
    }

    async fn replan(&self, state: &mut OrchestrationState, progress: &ProgressSink) -> RunPhase {
        let Some(stage) = &self.planning else {
            if state.goal_achieved || state.iteration >= self.settings.max_iter {
                return RunPhase::Done;
            }
            state.plan = Plan::new(vec![fast_step(&state.task, true)]);
            return RunPhase::Executing;
        };

        progress.emit("Reviewing progress", ProgressStatus::Running, None);
        let decision = stage
            .replanner
            .replan(&ReplanInput {
                task: &state.task,
                plan: &state.plan,
                completed: &state.completed_steps,
                candidates: &state.candidates,
                available: &self.available,
            })
            .await;

        state.plan_reasoning = decision.reasoning.clone();
        state.plan = decision.remaining;
        let status = if decision.used_fallback {
            ProgressStatus::Degraded
        } else {
            ProgressStatus::Complete
        };

        if decision.goal_achieved {
            state.goal_achieved = true;
            progress.emit("Reviewing progress", status, Some("Goal achieved".to_string()));
            return RunPhase::Done;
        }
        if state.iteration >= self.settings.max_iter {
            tracing::info!(max_iter = self.settings.max_iter, "iteration ceiling reached");
            progress.emit(
                "Reviewing progress",
                status,
                Some(format!("Step limit ({}) reached", self.settings.max_iter)),
            );
            return RunPhase::Done;
        }
        progress.emit(
            "Reviewing progress",
            status,
            Some(format!("Next: {}", state.plan.current().unwrap_or(GENERIC_STEP))),
        );
        RunPhase::Executing
    }
}

fn fast_step(task: &str, continuing: bool) -> String {
    if continuing {
        format!("Continue searching for more papers relevant to: {task}")
    } else {
        format!("Find the most relevant papers for: {task}")
    }
}

/// 根据配置与环境变量选择 LLM 后端
pub fn create_llm_from_config(cfg: &AppConfig, model: &str) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM");
        return Arc::new(crate::llm::MockLlmClient);
    }
    let use_deepseek = provider == "deepseek"
        && (std::env::var("DEEPSEEK_API_KEY").is_ok() || std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(cfg.llm.base_url.as_deref(), Some(model)))
    } else if use_openai {
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(crate::llm::MockLlmClient)
    }
}

/// 按配置组装检索器；mode 为 None 时使用配置中的 finder.mode
pub fn build_finder(cfg: &AppConfig, mode: Option<FinderMode>) -> Result<PaperFinder, AgentError> {
    let mode = match mode {
        Some(m) => m,
        None => cfg.finder.mode.parse()?,
    };
    let timeout = Duration::from_secs(cfg.llm.timeouts.request.max(1));
    let oracle = create_llm_from_config(cfg, &cfg.llm.model);
    let agent_llm = match cfg.llm.agent_model.as_deref() {
        Some(m) if m != cfg.llm.model => create_llm_from_config(cfg, m),
        _ => oracle.clone(),
    };

    let executor = ToolExecutor::new(default_registry(&cfg.tools), cfg.tools.tool_timeout_secs)
        .with_max_concurrent(cfg.finder.max_concurrent_tools);
    let agent = SearchAgent::new(agent_llm, Arc::new(executor), timeout)
        .with_max_observation_chars(cfg.finder.max_observation_chars);
    let reranker = RerankerHandle::from_config(&cfg.rerank);
    let settings = FinderSettings::for_mode(&cfg.finder, mode);

    let finder = PaperFinder::new(agent, reranker, settings);
    Ok(match mode {
        FinderMode::Fast => finder,
        FinderMode::Deliberate => finder.with_planning(
            Planner::new(oracle.clone(), timeout),
            Replanner::new(oracle, timeout, GoalPolicy::from(&cfg.finder.policy)),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("fast".parse::<FinderMode>().unwrap(), FinderMode::Fast);
        assert_eq!(" Deliberate ".parse::<FinderMode>().unwrap(), FinderMode::Deliberate);
        assert!(matches!(
            "turbo".parse::<FinderMode>(),
            Err(AgentError::ConfigError(_))
        ));
    }

    #[test]
    fn test_mode_presets() {
        let cfg = FinderSection::default();
        let d = FinderSettings::for_mode(&cfg, FinderMode::Deliberate);
        assert_eq!((d.max_iter, d.max_list_length, d.budget.tool_calls), (3, 35, 6));
        let f = FinderSettings::for_mode(&cfg, FinderMode::Fast);
        assert_eq!((f.max_iter, f.max_list_length, f.budget.tool_calls), (4, 20, 3));
    }

    #[test]
    fn test_build_finder_with_mock_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let finder = build_finder(&cfg, Some(FinderMode::Fast)).unwrap();
        assert_eq!(finder.mode(), FinderMode::Fast);
        let finder = build_finder(&cfg, None).unwrap();
        assert_eq!(finder.mode(), FinderMode::Deliberate);
    }
}
