//! 相关性重排序
//!
//! Reranker 对 (query, documents) 打分，每个文档一个分数；排序与截断在 consolidate 中本地完成。
//! 未配置凭据时构造为 RerankerHandle::Unavailable，属于合法配置而非错误。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RerankSection;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RerankError {
    #[error("Rerank request failed: {0}")]
    Request(String),

    #[error("Rerank service returned HTTP {0}")]
    Status(u16),

    #[error("Rerank returned {got} scores for {expected} documents")]
    ScoreMismatch { expected: usize, got: usize },
}

/// 重排序服务：返回与 documents 一一对应的分数
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError>;
}

/// 可用 / 不可用 两种状态（替代可空的全局客户端）
#[derive(Clone)]
pub enum RerankerHandle {
    Available(Arc<dyn Reranker>),
    Unavailable { reason: String },
}

impl RerankerHandle {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// 按配置构造：provider = "cohere" 且有 API Key 时可用，否则 Unavailable
    pub fn from_config(cfg: &RerankSection) -> Self {
        match cfg.provider.to_lowercase().as_str() {
            "cohere" => {
                let key = cfg
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("COHERE_API_KEY").ok())
                    .filter(|k| !k.trim().is_empty());
                match key {
                    Some(key) => {
                        tracing::info!(model = %cfg.model, "Cohere reranker initialized");
                        Self::Available(Arc::new(CohereReranker::new(
                            &cfg.base_url,
                            &cfg.model,
                            key,
                            cfg.timeout_secs,
                        )))
                    }
                    None => {
                        tracing::warn!("COHERE_API_KEY not set. Reranking will be skipped.");
                        Self::unavailable("COHERE_API_KEY not set")
                    }
                }
            }
            other => {
                tracing::warn!(provider = %other, "Reranking disabled by configuration");
                Self::unavailable(format!("rerank provider '{}'", other))
            }
        }
    }
}

impl std::fmt::Debug for RerankerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(r) => write!(f, "Available({})", r.name()),
            Self::Unavailable { reason } => write!(f, "Unavailable({})", reason),
        }
    }
}

#[derive(Serialize)]
struct CohereRerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct CohereRerankResponse {
    results: Vec<CohereRerankResult>,
}

#[derive(Deserialize)]
struct CohereRerankResult {
    index: usize,
    relevance_score: f64,
}

/// Cohere rerank v2
pub struct CohereReranker {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl CohereReranker {
    pub fn new(base_url: &str, model: &str, api_key: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: format!("{}/v2/rerank", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let body = CohereRerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: documents.len(),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RerankError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RerankError::Status(resp.status().as_u16()));
        }
        let parsed: CohereRerankResponse = resp
            .json()
            .await
            .map_err(|e| RerankError::Request(e.to_string()))?;

        // Cohere 只返回 top_n 条且按分数排序；还原为按输入下标对齐的分数向量
        let mut scores = vec![f64::NEG_INFINITY; documents.len()];
        let mut filled = 0;
        for r in parsed.results {
            if let Some(slot) = scores.get_mut(r.index) {
                *slot = r.relevance_score;
                filled += 1;
            }
        }
        if filled != documents.len() {
            return Err(RerankError::ScoreMismatch {
                expected: documents.len(),
                got: filled,
            });
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_unavailable_without_key() {
        let cfg = RerankSection {
            provider: "none".to_string(),
            ..RerankSection::default()
        };
        let handle = RerankerHandle::from_config(&cfg);
        assert!(!handle.is_available());
        assert!(format!("{:?}", handle).starts_with("Unavailable"));
    }

    #[test]
    fn test_handle_available_with_explicit_key() {
        let cfg = RerankSection {
            provider: "cohere".to_string(),
            api_key: Some("test-key".to_string()),
            ..RerankSection::default()
        };
        let handle = RerankerHandle::from_config(&cfg);
        assert!(handle.is_available());
    }
}
