//! 编排状态：计划、已完成步骤、运行阶段与最终结果
//!
//! OrchestrationState 由编排器独占，一次运行创建一次；其他组件只读它的字段并返回新值。

use serde::Serialize;

use crate::papers::CandidateSet;
use crate::tools::SearchModality;

/// 有序的计划步骤，第一个元素即「当前步骤」
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<String>,
}

impl Plan {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    pub fn current(&self) -> Option<&str> {
        self.steps.first().map(String::as_str)
    }

    /// 当前步骤之后的步骤
    pub fn upcoming(&self) -> &[String] {
        self.steps.get(1..).unwrap_or(&[])
    }

    /// 去掉当前步骤，返回新计划
    pub fn advanced(&self) -> Plan {
        Plan::new(self.upcoming().to_vec())
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 已完成步骤：只追加，顺序即执行顺序
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedStep {
    pub step: String,
    pub summary: String,
    /// 本步骤实际调用过的工具名（按首次调用顺序）
    pub tools_used: Vec<String>,
    /// 成功执行过的检索方式（去重，有序）
    pub modalities: Vec<SearchModality>,
    pub tool_calls: usize,
    pub new_papers: usize,
    pub budget_exhausted: bool,
}

impl CompletedStep {
    pub fn new(step: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            summary: summary.into(),
            tools_used: Vec::new(),
            modalities: Vec::new(),
            tool_calls: 0,
            new_papers: 0,
            budget_exhausted: false,
        }
    }

    pub fn with_modalities(mut self, modalities: impl IntoIterator<Item = SearchModality>) -> Self {
        let mut m: Vec<SearchModality> = modalities.into_iter().collect();
        m.sort();
        m.dedup();
        self.modalities = m;
        self
    }
}

/// 格式化已完成步骤，供 prompt 使用
pub fn format_completed_steps(steps: &[CompletedStep]) -> String {
    if steps.is_empty() {
        return "None".to_string();
    }
    steps
        .iter()
        .map(|s| format!("Task: {}\nResult: {}", s.step, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 编排阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    Executing,
    Replanning,
    Done,
}

/// 一次运行的完整可变上下文
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    pub tracking_id: String,
    pub task: String,
    pub focus_query: String,
    pub phase: RunPhase,
    pub plan: Plan,
    pub plan_reasoning: String,
    pub used_fallback_plan: bool,
    pub completed_steps: Vec<CompletedStep>,
    pub candidates: CandidateSet,
    pub iteration: usize,
    pub goal_achieved: bool,
}

impl OrchestrationState {
    pub fn new(tracking_id: String, task: String, focus_query: String) -> Self {
        Self {
            tracking_id,
            task,
            focus_query,
            phase: RunPhase::Planning,
            plan: Plan::default(),
            plan_reasoning: String::new(),
            used_fallback_plan: false,
            completed_steps: Vec::new(),
            candidates: CandidateSet::new(),
            iteration: 0,
            goal_achieved: false,
        }
    }

    pub fn into_outcome(self) -> FinderOutcome {
        FinderOutcome {
            tracking_id: self.tracking_id,
            task: self.task,
            focus_query: self.focus_query,
            success: self.goal_achieved,
            goal_achieved: self.goal_achieved,
            iterations: self.iteration,
            plan_reasoning: self.plan_reasoning,
            used_fallback_plan: self.used_fallback_plan,
            candidates: self.candidates,
            completed_steps: self.completed_steps,
        }
    }
}

/// 调用方输入：自然语言任务 + 仅用于重排序的关键词查询
#[derive(Debug, Clone, Default)]
pub struct FinderRequest {
    pub task: String,
    pub focus_query: String,
}

impl FinderRequest {
    pub fn new(task: impl Into<String>, focus_query: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            focus_query: focus_query.into(),
        }
    }
}

/// 终态：尽力而为的候选集 + 推理轨迹 + 成功标志
#[derive(Debug, Clone, Serialize)]
pub struct FinderOutcome {
    pub tracking_id: String,
    pub task: String,
    pub focus_query: String,
    pub success: bool,
    pub goal_achieved: bool,
    pub iterations: usize,
    pub plan_reasoning: String,
    pub used_fallback_plan: bool,
    pub candidates: CandidateSet,
    pub completed_steps: Vec<CompletedStep>,
}
