//! 错误类型与恢复动作
//!
//! 叶子调用的错误一律在本地降级，不会中止一次编排运行：
//! - Oracle 失败（LlmError / JsonParseError）：规划器回退计划、重规划器推进计划、Agent 重试或结束步骤
//! - 工具失败（ToolExecutionFailed / ToolTimeout / HallucinatedTool）：视为该调用零结果
//! - 重排序失败：在 consolidate 内退回按顺序截断
//!
//! 唯一向调用方返回的错误是 InvalidTask（任务为空，编排根本不会开始）。

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 将错误作为该工具调用的 Observation，结果计为空
    TreatAsEmpty(String),
    /// 结束当前步骤，保留已发现的论文
    FinishStep(String),
}
