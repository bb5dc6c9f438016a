//! 合并 + 重排序：每个计划步骤结束后调用一次（不是每次工具调用后）
//!
//! 1. merge：保持已有顺序，按发现顺序追加新 id
//! 2. rerank：focus query 为空或 reranker 不可用时直接按现有顺序截断；
//!    否则按分数降序取前 max_len，同分保持合并后的顺序；重排序失败时退回按顺序截断

use crate::papers::{CandidateSet, PaperRecord, RerankerHandle};

/// 一次合并的结果
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub candidates: CandidateSet,
    /// 是否实际执行了重排序
    pub reranked: bool,
    /// 本次新增（合并后、截断前）的记录数
    pub added: usize,
}

pub async fn consolidate(
    existing: &CandidateSet,
    incoming: &[PaperRecord],
    focus_query: &str,
    reranker: &RerankerHandle,
    max_len: usize,
) -> Consolidation {
    let merged = existing.merge(incoming);
    let added = merged.len() - existing.len();

    if merged.is_empty() {
        return Consolidation {
            candidates: merged,
            reranked: false,
            added,
        };
    }

    let query = focus_query.trim();
    let ranker = match reranker {
        RerankerHandle::Available(r) if !query.is_empty() => r,
        RerankerHandle::Available(_) => {
            tracing::warn!("Skipping rerank: no focus query provided");
            return truncated(merged, max_len, added);
        }
        RerankerHandle::Unavailable { reason } => {
            tracing::debug!(reason = %reason, "Skipping rerank: reranker unavailable");
            return truncated(merged, max_len, added);
        }
    };

    let documents: Vec<String> = merged.iter().map(PaperRecord::rerank_document).collect();
    let preview: String = query.chars().take(50).collect();
    tracing::debug!(count = documents.len(), query = %preview, "Reranking papers");

    match ranker.score(query, &documents).await {
        Ok(scores) if scores.len() == documents.len() => {
            // NaN 视为最低分
            let scores: Vec<f64> = scores
                .into_iter()
                .map(|s| if s.is_nan() { f64::NEG_INFINITY } else { s })
                .collect();
            let mut order: Vec<usize> = (0..documents.len()).collect();
            // 稳定排序：同分保持合并顺序
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
            let papers = merged.as_slice();
            let ranked = CandidateSet::from_records(
                order.into_iter().take(max_len).map(|i| papers[i].clone()),
            );
            tracing::info!(kept = ranked.len(), total = merged.len(), "Reranking successful");
            Consolidation {
                candidates: ranked,
                reranked: true,
                added,
            }
        }
        Ok(scores) => {
            tracing::error!(
                expected = documents.len(),
                got = scores.len(),
                "Reranking failed: score count mismatch"
            );
            truncated(merged, max_len, added)
        }
        Err(e) => {
            tracing::error!(error = %e, "Reranking failed");
            truncated(merged, max_len, added)
        }
    }
}

fn truncated(merged: CandidateSet, max_len: usize, added: usize) -> Consolidation {
    Consolidation {
        candidates: merged.truncated(max_len),
        reranked: false,
        added,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::papers::{RerankError, Reranker};

    /// 按文档中包含 query 的次数打分
    struct CountingReranker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reranker for CountingReranker {
        fn name(&self) -> &str {
            "counting"
        }

        async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(documents
                .iter()
                .map(|d| d.matches(query).count() as f64)
                .collect())
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        fn name(&self) -> &str {
            "failing"
        }

        async fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f64>, RerankError> {
            Err(RerankError::Status(503))
        }
    }

    /// 标题含 "broken" 的文档得到 NaN
    struct NanReranker;

    #[async_trait]
    impl Reranker for NanReranker {
        fn name(&self) -> &str {
            "nan"
        }

        async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError> {
            Ok(documents
                .iter()
                .map(|d| if d.contains("broken") { f64::NAN } else { 1.0 })
                .collect())
        }
    }

    fn p(id: &str, title: &str) -> PaperRecord {
        PaperRecord::new(id, title)
    }

    #[tokio::test]
    async fn test_blank_query_skips_reranker_and_truncates_in_order() {
        let ranker = Arc::new(CountingReranker {
            calls: AtomicUsize::new(0),
        });
        let handle = RerankerHandle::Available(ranker.clone());
        let existing = CandidateSet::from_records(vec![p("a", "x"), p("b", "y")]);
        let incoming = vec![p("c", "z"), p("a", "dup"), p("d", "w")];

        let out = consolidate(&existing, &incoming, "   ", &handle, 3).await;

        assert_eq!(out.candidates.ids(), vec!["a", "b", "c"]);
        assert!(!out.reranked);
        assert_eq!(out.added, 2);
        assert_eq!(ranker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerank_orders_by_score_with_stable_ties() {
        let handle = RerankerHandle::Available(Arc::new(CountingReranker {
            calls: AtomicUsize::new(0),
        }));
        let existing = CandidateSet::from_records(vec![p("a", "graph"), p("b", "graph graph")]);
        let incoming = vec![p("c", "none"), p("d", "graph")];

        let out = consolidate(&existing, &incoming, "graph", &handle, 10).await;

        // b 分数最高；a 与 d 同分保持合并顺序；c 最低
        assert_eq!(out.candidates.ids(), vec!["b", "a", "d", "c"]);
        assert!(out.reranked);
    }

    #[tokio::test]
    async fn test_rerank_truncates_lowest_scores() {
        let handle = RerankerHandle::Available(Arc::new(CountingReranker {
            calls: AtomicUsize::new(0),
        }));
        let existing = CandidateSet::from_records(vec![p("a", "nothing")]);
        let out = consolidate(&existing, &[p("b", "rust"), p("c", "rust rust")], "rust", &handle, 2).await;
        assert_eq!(out.candidates.ids(), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_rerank_failure_falls_back_to_discovery_order() {
        let handle = RerankerHandle::Available(Arc::new(FailingReranker));
        let existing = CandidateSet::from_records(vec![p("a", "1")]);
        let out = consolidate(&existing, &[p("b", "2"), p("c", "3")], "query", &handle, 2).await;
        assert_eq!(out.candidates.ids(), vec!["a", "b"]);
        assert!(!out.reranked);
    }

    #[tokio::test]
    async fn test_unavailable_reranker_truncates() {
        let handle = RerankerHandle::unavailable("no key");
        let out = consolidate(&CandidateSet::new(), &[p("a", "1"), p("b", "2")], "q", &handle, 1).await;
        assert_eq!(out.candidates.ids(), vec!["a"]);
        assert_eq!(out.added, 2);
    }

    #[tokio::test]
    async fn test_empty_inputs_yield_empty_set() {
        let handle = RerankerHandle::unavailable("no key");
        let out = consolidate(&CandidateSet::new(), &[], "q", &handle, 5).await;
        assert!(out.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_nan_scores_rank_last() {
        let handle = RerankerHandle::Available(Arc::new(NanReranker));
        let existing = CandidateSet::from_records(vec![p("a", "broken"), p("b", "fine"), p("c", "broken too")]);
        let out = consolidate(&existing, &[p("d", "fine again")], "q", &handle, 3).await;
        assert_eq!(out.candidates.ids(), vec!["b", "d", "a"]);
        assert!(out.reranked);
    }
}
