//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供检索子循环决定是重试、记为空结果还是结束步骤。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => {
                let preview: String = raw.chars().take(200).collect();
                RecoveryAction::RetryWithPrompt(format!(
                    "Your previous output was not valid JSON ({preview}). \
                     To call tools, output ONLY one JSON object of the form \
                     {{\"tool_calls\": [{{\"tool\": \"<name>\", \"args\": {{...}}}}]}}. \
                     When the current goal is complete, reply with a plain-text summary instead."
                ))
            }
            AgentError::ToolExecutionFailed(msg) => RecoveryAction::TreatAsEmpty(format!("Error: {msg}")),
            AgentError::ToolTimeout(tool) => {
                RecoveryAction::TreatAsEmpty(format!("Error: tool {tool} timed out"))
            }
            AgentError::HallucinatedTool(name) => RecoveryAction::TreatAsEmpty(format!(
                "Error: unknown tool '{name}'. Use only the tools listed in the instructions."
            )),
            AgentError::LlmError(e) => {
                RecoveryAction::FinishStep(format!("Search agent unavailable ({e}); step ended early."))
            }
            other => RecoveryAction::FinishStep(format!("Step ended early: {other}")),
        }
    }
}
