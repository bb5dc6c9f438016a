//! 候选集：按发现顺序保存、按 paperId 去重的论文列表
//!
//! 所有更新都是函数式的：merge / truncate 返回新的 CandidateSet，不原地修改，
//! 因此同一步骤内并发分发的工具调用无需加锁。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::papers::PaperRecord;

/// 有序、无重复 id 的论文集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet {
    papers: Vec<PaperRecord>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从任意记录序列构建（保留首次出现的记录）
    pub fn from_records(records: impl IntoIterator<Item = PaperRecord>) -> Self {
        let records: Vec<PaperRecord> = records.into_iter().collect();
        Self::new().merge(&records)
    }

    /// 合并：保持已有顺序，再按发现顺序追加 id 未出现过的记录；空 id 的记录丢弃
    pub fn merge(&self, incoming: &[PaperRecord]) -> Self {
        let mut seen: HashSet<&str> = self.papers.iter().map(|p| p.paper_id.as_str()).collect();
        let mut papers = self.papers.clone();
        for record in incoming {
            if record.paper_id.trim().is_empty() {
                continue;
            }
            if seen.insert(record.paper_id.as_str()) {
                papers.push(record.clone());
            }
        }
        Self { papers }
    }

    /// 只保留前 max 条
    pub fn truncated(&self, max: usize) -> Self {
        Self {
            papers: self.papers.iter().take(max).cloned().collect(),
        }
    }

    /// incoming 中不在本集合里的记录（按发现顺序、自身去重）
    pub fn unseen(&self, incoming: &[PaperRecord]) -> Vec<PaperRecord> {
        let base_len = self.papers.len();
        self.merge(incoming).papers.split_off(base_len)
    }

    pub fn contains(&self, paper_id: &str) -> bool {
        self.papers.iter().any(|p| p.paper_id == paper_id)
    }

    pub fn get(&self, paper_id: &str) -> Option<&PaperRecord> {
        self.papers.iter().find(|p| p.paper_id == paper_id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.papers.iter().map(|p| p.paper_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaperRecord> {
        self.papers.iter()
    }

    pub fn as_slice(&self) -> &[PaperRecord] {
        &self.papers
    }

    pub fn into_vec(self) -> Vec<PaperRecord> {
        self.papers
    }

    /// 渲染为 prompt 中的论文列表
    pub fn render(&self, include_abstract: bool) -> String {
        if self.papers.is_empty() {
            return "No papers found yet".to_string();
        }
        self.papers
            .iter()
            .map(|paper| {
                let mut lines = vec![
                    format!("- {}", paper.title_or_default()),
                    format!("  Paper ID: {}", paper.paper_id),
                    format!("  Authors: {}", paper.authors_short()),
                    format!("  Published: {}", paper.published()),
                ];
                if include_abstract {
                    if let Some(abs) = paper.abstract_text.as_deref().filter(|a| !a.is_empty()) {
                        lines.push(format!("  Abstract: {}", abs));
                    }
                }
                lines.join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a PaperRecord;
    type IntoIter = std::slice::Iter<'a, PaperRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.papers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> PaperRecord {
        PaperRecord::new(id, format!("Title {id}"))
    }

    fn has_unique_ids(set: &CandidateSet) -> bool {
        let ids: HashSet<&str> = set.ids().into_iter().collect();
        ids.len() == set.len()
    }

    #[test]
    fn test_merge_preserves_order_and_appends_new() {
        let base = CandidateSet::from_records(vec![p("a"), p("b")]);
        let merged = base.merge(&[p("c"), p("a"), p("d")]);
        assert_eq!(merged.ids(), vec!["a", "b", "c", "d"]);
        // 原集合不变
        assert_eq!(base.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_dedups_within_incoming() {
        let merged = CandidateSet::new().merge(&[p("x"), p("y"), p("x")]);
        assert_eq!(merged.ids(), vec!["x", "y"]);
    }

    #[test]
    fn test_merge_keeps_first_seen_fields() {
        let base = CandidateSet::from_records(vec![PaperRecord::new("a", "Original")]);
        let merged = base.merge(&[PaperRecord::new("a", "Changed")]);
        assert_eq!(merged.get("a").unwrap().title.as_deref(), Some("Original"));
    }

    #[test]
    fn test_merge_drops_empty_ids() {
        let merged = CandidateSet::new().merge(&[p(""), p("  "), p("ok")]);
        assert_eq!(merged.ids(), vec!["ok"]);
    }

    #[test]
    fn test_dedup_invariant_over_merge_sequence() {
        let batches = vec![
            vec![p("1"), p("2"), p("3")],
            vec![p("3"), p("4")],
            vec![p("1"), p("1"), p("5")],
            vec![],
            vec![p("5"), p("6"), p("2")],
        ];
        let mut set = CandidateSet::new();
        let mut previous: HashSet<String> = HashSet::new();
        for batch in &batches {
            set = set.merge(batch);
            assert!(has_unique_ids(&set));
            let now: HashSet<String> = set.ids().into_iter().map(String::from).collect();
            assert!(previous.is_subset(&now));
            previous = now;
        }
        assert_eq!(set.ids(), vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn test_unseen_returns_only_new_in_order() {
        let base = CandidateSet::from_records(vec![p("a")]);
        let new = base.unseen(&[p("b"), p("a"), p("c"), p("b")]);
        let ids: Vec<&str> = new.iter().map(|r| r.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_render_empty_and_entries() {
        assert_eq!(CandidateSet::new().render(false), "No papers found yet");
        let set = CandidateSet::from_records(vec![p("a")
            .with_authors(["Ada Lovelace"])
            .with_abstract("An abstract")
            .with_year(1843)]);
        let without = set.render(false);
        assert!(without.contains("- Title a"));
        assert!(without.contains("Ada Lovelace"));
        assert!(without.contains("1843"));
        assert!(!without.contains("An abstract"));
        assert!(set.render(true).contains("Abstract: An abstract"));
    }
}
