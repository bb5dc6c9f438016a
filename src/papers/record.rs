//! 论文记录：由检索 / 引用工具创建，创建后不可变
//!
//! 字段名与学术索引（Semantic Scholar Graph API）返回的 JSON 一致（camelCase）。
//! 身份只看 `paperId`：两条 id 相同的记录视为同一实体，其余字段差异不影响相等性。

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// 作者
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// 论文记录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    pub paper_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influential_citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open_access: Option<bool>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Author>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Author>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PaperRecord {
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_authors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = names
            .into_iter()
            .map(|n| Author {
                author_id: None,
                name: n.into(),
            })
            .collect();
        self
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = Some(text.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// 出版日期，缺省时退回年份
    pub fn published(&self) -> String {
        match (&self.publication_date, self.year) {
            (Some(d), _) if !d.is_empty() => d.clone(),
            (_, Some(y)) => y.to_string(),
            _ => "N/A".to_string(),
        }
    }

    /// 前三位作者 + et al.
    pub fn authors_short(&self) -> String {
        let names: Vec<&str> = self
            .authors
            .iter()
            .take(3)
            .map(|a| a.name.as_str())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return "Unknown".to_string();
        }
        let mut s = names.join(", ");
        if self.authors.len() > 3 {
            s.push_str(" et al.");
        }
        s
    }

    /// 供重排序模型打分的文档文本
    pub fn rerank_document(&self) -> String {
        let authors: Vec<&str> = self.authors.iter().map(|a| a.name.as_str()).collect();
        format!(
            "Title: {}\nAbstract: {}\nAuthors: {}",
            self.title.as_deref().unwrap_or("No title"),
            self.abstract_text.as_deref().unwrap_or("No abstract"),
            authors.join(", ")
        )
    }
}

impl PartialEq for PaperRecord {
    fn eq(&self, other: &Self) -> bool {
        self.paper_id == other.paper_id
    }
}

impl Eq for PaperRecord {}

impl Hash for PaperRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.paper_id.hash(state);
    }
}
