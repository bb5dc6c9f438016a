//! LLM 客户端抽象
//!
//! 规划、重规划与检索 Agent 共用同一个 trait：complete 接收完整消息列表，返回文本；
//! 结构化输出由调用方从文本中提取 JSON 并反序列化。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// LLM 调用错误（统一归类为 Oracle 失败，由调用方按各自策略降级）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 带超时的一次调用：超时映射为 LlmError::Timeout，保证调用方不会无限等待
pub async fn complete_with_timeout(
    llm: &dyn LlmClient,
    messages: &[Message],
    limit: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(limit, llm.complete(messages)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(limit)),
    }
}
