//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CORVUS__*` 覆盖（双下划线表示嵌套，如 `CORVUS__FINDER__MODE=fast`）。
//! API Key 不写入配置文件，统一从环境变量读取（OPENAI_API_KEY / S2_API_KEY / TAVILY_API_KEY / COHERE_API_KEY）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub finder: FinderSection,
    pub tools: ToolsSection,
    pub rerank: RerankSection,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 检索 Agent 使用的模型（缺省与 model 相同）
    pub agent_model: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            agent_model: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 LLM 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [finder] 段：编排模式、步骤预算、目标判定阈值
#[derive(Debug, Clone, Deserialize)]
pub struct FinderSection {
    /// deliberate（计划-执行-重规划）/ fast（单一连续工具循环）
    #[serde(default = "default_mode")]
    pub mode: String,
    /// 同一轮内并发执行的工具调用数上限
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: usize,
    /// 单个步骤内 Agent 最多被询问的轮数（含格式错误重试）
    #[serde(default = "default_max_agent_turns")]
    pub max_agent_turns: usize,
    /// 回填给 Agent 的单条 Observation 最大字符数
    #[serde(default = "default_max_observation_chars")]
    pub max_observation_chars: usize,
    #[serde(default = "ModeSection::deliberate")]
    pub deliberate: ModeSection,
    #[serde(default = "ModeSection::fast")]
    pub fast: ModeSection,
    #[serde(default)]
    pub policy: PolicySection,
}

impl Default for FinderSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            max_concurrent_tools: default_max_concurrent_tools(),
            max_agent_turns: default_max_agent_turns(),
            max_observation_chars: default_max_observation_chars(),
            deliberate: ModeSection::deliberate(),
            fast: ModeSection::fast(),
            policy: PolicySection::default(),
        }
    }
}

fn default_mode() -> String {
    "deliberate".to_string()
}

fn default_max_concurrent_tools() -> usize {
    4
}

fn default_max_agent_turns() -> usize {
    8
}

fn default_max_observation_chars() -> usize {
    6000
}

/// [finder.deliberate] / [finder.fast]
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModeSection {
    /// 迭代上限（执行的计划步骤数）
    pub max_iter: usize,
    /// 候选集保留的最大论文数
    pub max_list_length: usize,
    /// 单个步骤内的工具调用预算
    pub tool_call_budget: usize,
}

impl ModeSection {
    pub fn deliberate() -> Self {
        Self {
            max_iter: 3,
            max_list_length: 35,
            tool_call_budget: 6,
        }
    }

    pub fn fast() -> Self {
        Self {
            max_iter: 4,
            max_list_length: 20,
            tool_call_budget: 3,
        }
    }
}

/// [finder.policy] 段：目标达成阈值（可调的经验值，不是结构性不变量）
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PolicySection {
    /// 定向查找（特定论文 / 作者）：匹配记录数下限
    #[serde(default = "default_narrow_min_matches")]
    pub narrow_min_matches: usize,
    /// 宽泛主题：候选集论文数下限
    #[serde(default = "default_broad_min_papers")]
    pub broad_min_papers: usize,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            narrow_min_matches: default_narrow_min_matches(),
            broad_min_papers: default_broad_min_papers(),
        }
    }
}

fn default_narrow_min_matches() -> usize {
    1
}

fn default_broad_min_papers() -> usize {
    7
}

/// [tools] 段：工具超时与各后端
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub semantic_scholar: SemanticScholarSection,
    #[serde(default)]
    pub web_search: WebSearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            semantic_scholar: SemanticScholarSection::default(),
            web_search: WebSearchSection::default(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [tools.semantic_scholar] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticScholarSection {
    #[serde(default = "default_s2_base_url")]
    pub base_url: String,
    /// 未设置时读取环境变量 S2_API_KEY；均为空则匿名访问
    pub api_key: Option<String>,
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    #[serde(default = "default_snowball_limit")]
    pub snowball_limit: usize,
}

impl Default for SemanticScholarSection {
    fn default() -> Self {
        Self {
            base_url: default_s2_base_url(),
            api_key: None,
            default_limit: default_search_limit(),
            snowball_limit: default_snowball_limit(),
        }
    }
}

fn default_s2_base_url() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_search_limit() -> usize {
    10
}

fn default_snowball_limit() -> usize {
    50
}

/// [tools.web_search] 段（Tavily）
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchSection {
    #[serde(default = "default_tavily_url")]
    pub base_url: String,
    /// 未设置时读取环境变量 TAVILY_API_KEY；为空则不注册网页搜索工具
    pub api_key: Option<String>,
    #[serde(default = "default_web_max_results")]
    pub max_results: usize,
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            base_url: default_tavily_url(),
            api_key: None,
            max_results: default_web_max_results(),
        }
    }
}

fn default_tavily_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_web_max_results() -> usize {
    5
}

/// [rerank] 段
#[derive(Debug, Clone, Deserialize)]
pub struct RerankSection {
    /// cohere / none
    #[serde(default = "default_rerank_provider")]
    pub provider: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_rerank_url")]
    pub base_url: String,
    /// 未设置时读取环境变量 COHERE_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_rerank_timeout")]
    pub timeout_secs: u64,
}

impl Default for RerankSection {
    fn default() -> Self {
        Self {
            provider: default_rerank_provider(),
            model: default_rerank_model(),
            base_url: default_rerank_url(),
            api_key: None,
            timeout_secs: default_rerank_timeout(),
        }
    }
}

fn default_rerank_provider() -> String {
    "cohere".to_string()
}

fn default_rerank_model() -> String {
    "rerank-v3.5".to_string()
}

fn default_rerank_url() -> String {
    "https://api.cohere.com".to_string()
}

fn default_rerank_timeout() -> u64 {
    30
}

/// 从 config 目录加载配置，环境变量 CORVUS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CORVUS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CORVUS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
