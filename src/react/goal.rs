//! 目标判定：把「是否已找到足够论文」从 LLM 的主观判断变成可检验的规则
//!
//! - 定向查找（narrow）：候选集中至少有 narrow_min_matches 条记录匹配任务里的作者 / 标题，
//!   或是重规划器点名且确实在候选集中的论文；
//! - 宽泛主题（broad）：候选集至少 broad_min_papers 篇，且已完成步骤覆盖了核心检索方式
//!   （学术索引 + 网页搜索，任务提到引用关系时再加引用图遍历；只计已注册的方式）。
//!
//! 重规划器声称达成但规则不成立时，以规则为准。

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::PolicySection;
use crate::core::state::CompletedStep;
use crate::papers::{CandidateSet, PaperRecord};
use crate::tools::SearchModality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    /// 查找特定论文或特定作者
    Narrow,
    /// 主题综述式检索
    Broad,
}

impl SearchIntent {
    pub fn classify(task: &str) -> Self {
        if !LookupTarget::from_task(task).is_empty() || the_paper_re().is_match(task) {
            Self::Narrow
        } else {
            Self::Broad
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "narrow" | "specific" | "lookup" => Some(Self::Narrow),
            "broad" | "topic" | "survey" => Some(Self::Broad),
            _ => None,
        }
    }
}

static AUTHOR_RE: OnceLock<Regex> = OnceLock::new();
static QUOTED_RE: OnceLock<Regex> = OnceLock::new();
static TITLED_RE: OnceLock<Regex> = OnceLock::new();
static THE_PAPER_RE: OnceLock<Regex> = OnceLock::new();
static CITATION_RE: OnceLock<Regex> = OnceLock::new();

fn author_re() -> &'static Regex {
    AUTHOR_RE.get_or_init(|| {
        Regex::new(
            r"\b(?i:(?:papers?|articles?|publications?)\s+(?:authored\s+|written\s+)?by|authored\s+by|written\s+by)\s+((?:[A-Z][\w'\-]*\.?\s?){1,4})",
        )
        .unwrap()
    })
}

fn quoted_re() -> &'static Regex {
    QUOTED_RE.get_or_init(|| Regex::new(r#"["“]([^"”]{6,})["”]"#).unwrap())
}

fn titled_re() -> &'static Regex {
    TITLED_RE.get_or_init(|| Regex::new(r"(?i)\b(?:titled|called|named)\s+([^\n.?!]{6,})").unwrap())
}

fn the_paper_re() -> &'static Regex {
    THE_PAPER_RE.get_or_init(|| Regex::new(r"(?i)\bthe\s+(?:original\s+|seminal\s+)?(?:paper|article)\b").unwrap())
}

fn citation_re() -> &'static Regex {
    CITATION_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:cit(?:e|es|ed|ing|ation|ations)|references?|snowball\w*|builds?\s+on)\b").unwrap()
    })
}

/// 任务是否显式要求引用关系检索
pub fn wants_citations(task: &str) -> bool {
    citation_re().is_match(task)
}

/// 从任务中抽取的查找目标（作者 / 标题）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTarget {
    pub author: Option<String>,
    pub title: Option<String>,
}

impl LookupTarget {
    pub fn from_task(task: &str) -> Self {
        let author = author_re()
            .captures(task)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().trim_end_matches('.').to_string())
            .filter(|a| !a.is_empty());
        let title = quoted_re()
            .captures(task)
            .or_else(|| titled_re().captures(task))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());
        Self { author, title }
    }

    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.title.is_none()
    }

    pub fn matches(&self, record: &PaperRecord) -> bool {
        let by_author = self
            .author
            .as_deref()
            .map(|a| record.authors.iter().any(|au| author_matches(a, &au.name)))
            .unwrap_or(false);
        let by_title = match (self.title.as_deref(), record.title.as_deref()) {
            (Some(want), Some(have)) => {
                let want = normalize(want);
                let have = normalize(have);
                !want.is_empty() && (have.contains(&want) || (have.len() >= 12 && want.contains(&have)))
            }
            _ => false,
        };
        by_author || by_title
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 目标作者的每个词都要出现在候选作者名中；单字母视为首字母缩写
fn author_matches(target: &str, candidate: &str) -> bool {
    let have = normalize(candidate);
    let have: Vec<&str> = have.split(' ').filter(|t| !t.is_empty()).collect();
    let want = normalize(target);
    let want: Vec<&str> = want.split(' ').filter(|t| !t.is_empty()).collect();
    !want.is_empty()
        && want.iter().all(|w| {
            if w.chars().count() == 1 {
                have.iter().any(|h| h.starts_with(w))
            } else {
                have.contains(w)
            }
        })
}

/// 判定结果
#[derive(Debug, Clone, PartialEq)]
pub struct GoalAssessment {
    pub intent: SearchIntent,
    pub achieved: bool,
    /// 定向查找时匹配的候选 id（按候选集顺序）
    pub matched_ids: Vec<String>,
    pub missing_modalities: Vec<SearchModality>,
    pub reason: String,
}

/// 目标判定规则
#[derive(Debug, Clone, PartialEq)]
pub struct GoalPolicy {
    pub narrow_min_matches: usize,
    pub broad_min_papers: usize,
}

impl Default for GoalPolicy {
    fn default() -> Self {
        Self::from(&PolicySection::default())
    }
}

impl From<&PolicySection> for GoalPolicy {
    fn from(cfg: &PolicySection) -> Self {
        Self {
            narrow_min_matches: cfg.narrow_min_matches.max(1),
            broad_min_papers: cfg.broad_min_papers.max(1),
        }
    }
}

impl GoalPolicy {
    /// 宽泛检索需要覆盖的检索方式（只计已注册的）
    pub fn required_modalities(
        &self,
        task: &str,
        available: &BTreeSet<SearchModality>,
    ) -> BTreeSet<SearchModality> {
        let mut required = BTreeSet::from([SearchModality::IndexSearch, SearchModality::WebSearch]);
        if wants_citations(task) {
            required.insert(SearchModality::CitationChase);
        }
        required.intersection(available).copied().collect()
    }

    /// 意图：重规划器给出 broad 即为 broad；给出 narrow 时需任务本身是定向查找，
    /// 或其点名的论文确实在候选集中；未给出时按任务文本判断
    pub fn resolve_intent(
        &self,
        task: &str,
        declared: Option<SearchIntent>,
        cited_ids: &[String],
        candidates: &CandidateSet,
    ) -> SearchIntent {
        let heuristic = SearchIntent::classify(task);
        match declared {
            Some(SearchIntent::Broad) => SearchIntent::Broad,
            Some(SearchIntent::Narrow) => {
                let verified_citation = cited_ids.iter().any(|id| candidates.contains(id));
                if verified_citation || heuristic == SearchIntent::Narrow {
                    SearchIntent::Narrow
                } else {
                    SearchIntent::Broad
                }
            }
            None => heuristic,
        }
    }

    pub fn assess(
        &self,
        task: &str,
        intent: SearchIntent,
        completed: &[CompletedStep],
        candidates: &CandidateSet,
        cited_ids: &[String],
        available: &BTreeSet<SearchModality>,
    ) -> GoalAssessment {
        match intent {
            SearchIntent::Narrow => {
                let target = LookupTarget::from_task(task);
                let matched_ids: Vec<String> = candidates
                    .iter()
                    .filter(|p| cited_ids.iter().any(|c| c == &p.paper_id) || target.matches(p))
                    .map(|p| p.paper_id.clone())
                    .collect();
                let achieved = matched_ids.len() >= self.narrow_min_matches;
                let reason = if achieved {
                    format!("{} matching paper(s) retrieved", matched_ids.len())
                } else {
                    "no matching paper retrieved yet".to_string()
                };
                GoalAssessment {
                    intent,
                    achieved,
                    matched_ids,
                    missing_modalities: Vec::new(),
                    reason,
                }
            }
            SearchIntent::Broad => {
                let exercised: BTreeSet<SearchModality> = completed
                    .iter()
                    .flat_map(|s| s.modalities.iter().copied())
                    .collect();
                let missing: Vec<SearchModality> = self
                    .required_modalities(task, available)
                    .difference(&exercised)
                    .copied()
                    .collect();
                let enough = candidates.len() >= self.broad_min_papers;
                let achieved = enough && missing.is_empty();
                let reason = match (enough, missing.is_empty()) {
                    (true, true) => format!("{} papers retrieved across core search modalities", candidates.len()),
                    (false, _) => format!(
                        "{} of {} required papers retrieved",
                        candidates.len(),
                        self.broad_min_papers
                    ),
                    (true, false) => format!("search modalities not yet used: {:?}", missing),
                };
                GoalAssessment {
                    intent,
                    achieved,
                    matched_ids: Vec::new(),
                    missing_modalities: missing,
                    reason,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_modalities() -> BTreeSet<SearchModality> {
        BTreeSet::from([
            SearchModality::WebSearch,
            SearchModality::IndexSearch,
            SearchModality::CitationChase,
        ])
    }

    fn papers(n: usize) -> CandidateSet {
        CandidateSet::from_records((0..n).map(|i| PaperRecord::new(format!("p{i}"), format!("Paper {i}"))))
    }

    #[test]
    fn test_classify_intent() {
        assert_eq!(SearchIntent::classify("find papers by Geoffrey Hinton"), SearchIntent::Narrow);
        assert_eq!(
            SearchIntent::classify("find \"Attention Is All You Need\""),
            SearchIntent::Narrow
        );
        assert_eq!(SearchIntent::classify("a survey of graph neural networks"), SearchIntent::Broad);
        assert_eq!(SearchIntent::classify("papers on GNNs published by 2020"), SearchIntent::Broad);
        assert_eq!(
            SearchIntent::classify("A survey of reinforcement learning methods popularized by DeepMind"),
            SearchIntent::Broad
        );
        assert_eq!(SearchIntent::classify("articles written by Yann LeCun"), SearchIntent::Narrow);
    }

    #[test]
    fn test_lookup_target_extraction() {
        let t = LookupTarget::from_task("Find papers by Author X on topic Y");
        assert_eq!(t.author.as_deref(), Some("Author X"));
        let t = LookupTarget::from_task("the paper titled Deep Residual Learning for Image Recognition");
        assert_eq!(t.title.as_deref(), Some("Deep Residual Learning for Image Recognition"));
    }

    #[test]
    fn test_author_matching_handles_initials() {
        assert!(author_matches("Hinton", "Geoffrey E. Hinton"));
        assert!(author_matches("G. Hinton", "Geoffrey Hinton"));
        assert!(!author_matches("Yann LeCun", "Geoffrey Hinton"));
    }

    #[test]
    fn test_narrow_achieved_with_one_match() {
        let policy = GoalPolicy::default();
        let task = "find papers by Author X";
        let set = CandidateSet::from_records(vec![
            PaperRecord::new("a", "Unrelated"),
            PaperRecord::new("b", "Something").with_authors(["Author X"]),
        ]);
        let a = policy.assess(task, SearchIntent::Narrow, &[], &set, &[], &all_modalities());
        assert!(a.achieved);
        assert_eq!(a.matched_ids, vec!["b".to_string()]);

        let empty = policy.assess(task, SearchIntent::Narrow, &[], &CandidateSet::new(), &[], &all_modalities());
        assert!(!empty.achieved);
    }

    #[test]
    fn test_narrow_ignores_cited_ids_outside_set() {
        let policy = GoalPolicy::default();
        let set = papers(2);
        let ghost = policy.assess("the paper", SearchIntent::Narrow, &[], &set, &["zzz".into()], &all_modalities());
        assert!(!ghost.achieved);
        let real = policy.assess("the paper", SearchIntent::Narrow, &[], &set, &["p1".into()], &all_modalities());
        assert!(real.achieved);
    }

    #[test]
    fn test_broad_requires_count_and_modalities() {
        let policy = GoalPolicy::default();
        let task = "survey of topic Y";
        let index_only = vec![CompletedStep::new("db", "ok").with_modalities([SearchModality::IndexSearch])];
        let both = vec![
            CompletedStep::new("web", "ok").with_modalities([SearchModality::WebSearch]),
            CompletedStep::new("db", "ok").with_modalities([SearchModality::IndexSearch]),
        ];

        let a = policy.assess(task, SearchIntent::Broad, &index_only, &papers(10), &[], &all_modalities());
        assert!(!a.achieved);
        assert_eq!(a.missing_modalities, vec![SearchModality::WebSearch]);

        let b = policy.assess(task, SearchIntent::Broad, &both, &papers(6), &[], &all_modalities());
        assert!(!b.achieved);

        let c = policy.assess(task, SearchIntent::Broad, &both, &papers(7), &[], &all_modalities());
        assert!(c.achieved);
    }

    #[test]
    fn test_required_modalities_follow_task_and_registry() {
        let policy = GoalPolicy::default();
        let req = policy.required_modalities("papers citing BERT", &all_modalities());
        assert!(req.contains(&SearchModality::CitationChase));
        let no_web = BTreeSet::from([SearchModality::IndexSearch, SearchModality::CitationChase]);
        let req = policy.required_modalities("survey of GNNs", &no_web);
        assert_eq!(req, BTreeSet::from([SearchModality::IndexSearch]));
    }

    #[test]
    fn test_resolve_intent_trusts_only_verified_narrow_claims() {
        let policy = GoalPolicy::default();
        let set = papers(3);
        let task = "find the BERT model introduction";
        assert_eq!(
            policy.resolve_intent(task, Some(SearchIntent::Narrow), &["p0".into()], &set),
            SearchIntent::Narrow
        );
        assert_eq!(
            policy.resolve_intent(task, Some(SearchIntent::Narrow), &["nope".into()], &set),
            SearchIntent::Broad
        );
    }

    #[test]
    fn test_declared_broad_wins_over_by_phrase() {
        let policy = GoalPolicy::default();
        let task = "A survey of reinforcement learning methods popularized by DeepMind";
        let set = papers(10);
        let intent = policy.resolve_intent(task, Some(SearchIntent::Broad), &[], &set);
        assert_eq!(intent, SearchIntent::Broad);

        let both = vec![
            CompletedStep::new("web", "ok").with_modalities([SearchModality::WebSearch]),
            CompletedStep::new("db", "ok").with_modalities([SearchModality::IndexSearch]),
        ];
        let a = policy.assess(task, intent, &both, &set, &[], &all_modalities());
        assert!(a.achieved);

        // 即使任务里有明确的作者短语，综述式的 broad 判断也要求足量论文
        let hinton = "a survey of papers by Geoffrey Hinton";
        let intent = policy.resolve_intent(hinton, Some(SearchIntent::Broad), &[], &papers(1));
        assert_eq!(intent, SearchIntent::Broad);
        let one = CandidateSet::from_records(vec![PaperRecord::new("h", "T").with_authors(["Geoffrey Hinton"])]);
        assert!(!policy.assess(hinton, intent, &both, &one, &[], &all_modalities()).achieved);
    }

    #[test]
    fn test_undeclared_intent_uses_task_text() {
        let policy = GoalPolicy::default();
        let set = papers(2);
        assert_eq!(
            policy.resolve_intent("find papers by Geoffrey Hinton", None, &[], &set),
            SearchIntent::Narrow
        );
        assert_eq!(
            policy.resolve_intent("recent work on diffusion models", None, &[], &set),
            SearchIntent::Broad
        );
    }
}
