//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! - MockLlmClient：回显最后一条 User 消息（纯文本），规划器会走回退计划、检索 Agent 立即结束
//! - ScriptedLlmClient：按顺序返回预设回复，并记录每次调用收到的消息，便于断言

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user.trim()))
    }
}

/// 脚本化客户端：依次弹出预设回复；脚本耗尽后返回 fallback（默认为 ApiError）
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<Result<String, LlmError>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条成功回复
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// 追加一条失败回复
    pub fn fail(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    /// 脚本耗尽后每次都返回该结果（如「一直请求工具」的 Agent）
    pub fn then_always(mut self, result: Result<String, LlmError>) -> Self {
        self.fallback = Some(result);
        self
    }

    fn push(self, item: Result<String, LlmError>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(item);
        }
        self
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 第 n 次调用收到的消息
    pub fn call(&self, n: usize) -> Option<Vec<Message>> {
        self.calls.lock().ok().and_then(|c| c.get(n).cloned())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(item) => item,
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Err(LlmError::ApiError("script exhausted".to_string()))),
        }
    }
}
