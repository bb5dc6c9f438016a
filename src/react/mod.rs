//! 认知层：Planner、Replanner、目标判定、检索 Agent 单步循环、进度事件

pub mod events;
pub mod goal;
pub mod loop_;
pub mod planner;
pub mod prompts;
pub mod replanner;

pub use events::{ProgressEvent, ProgressSink, ProgressStatus};
pub use goal::{GoalAssessment, GoalPolicy, LookupTarget, SearchIntent};
pub use loop_::{SearchAgent, StepBudget, StepContext, StepOutcome};
pub use planner::{
    extract_json, fallback_plan, is_meta_step, parse_agent_turn, AgentTurn, PlanOutput, Planner,
    ToolCall, FALLBACK_PLAN, GENERIC_STEP,
};
pub use replanner::{ReplanDecision, ReplanInput, Replanner};
