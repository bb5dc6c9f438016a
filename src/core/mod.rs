//! 核心编排层：错误与恢复、运行状态、主控状态机

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{build_finder, create_llm_from_config, FinderMode, FinderSettings, PaperFinder};
pub use recovery::RecoveryEngine;
pub use state::{
    format_completed_steps, CompletedStep, FinderOutcome, FinderRequest, OrchestrationState, Plan,
    RunPhase,
};
