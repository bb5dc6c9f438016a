//! 论文数据层：记录、候选集、合并与重排序

pub mod candidates;
pub mod consolidate;
pub mod record;
pub mod rerank;

pub use candidates::CandidateSet;
pub use consolidate::{consolidate, Consolidation};
pub use record::{Author, PaperRecord};
pub use rerank::{CohereReranker, RerankError, Reranker, RerankerHandle};
