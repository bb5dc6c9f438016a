//! Corvus - 学术论文检索智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 计划 - 执行 - 重规划编排、运行状态、错误与恢复
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **papers**: 论文记录、候选集、合并与重排序
//! - **react**: Planner、Replanner、目标判定、检索 Agent 工具循环
//! - **tools**: 学术索引 / 引用图 / 网页搜索工具与执行器

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod papers;
pub mod react;
pub mod tools;

pub use crate::core::{build_finder, FinderMode, FinderOutcome, FinderRequest, PaperFinder};
