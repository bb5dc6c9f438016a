//! Replanner：每个步骤完成后判断目标是否达成，并给出剩余计划
//!
//! 输入的 plan 以「刚执行完的步骤」开头。LLM 的 goal_achieved 只是参考，最终由 GoalPolicy 裁决；
//! 新计划会去掉已完成步骤和非检索步骤，为空时补一个通用检索步骤。
//! LLM 调用失败或输出无效时：goal_achieved = false，剩余计划为 plan[1..]（为空则通用步骤）。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::core::state::{format_completed_steps, CompletedStep, Plan};
use crate::llm::{complete_with_timeout, LlmClient, Message};
use crate::papers::CandidateSet;
use crate::react::goal::{GoalPolicy, SearchIntent};
use crate::react::planner::{is_meta_step, parse_structured, GENERIC_STEP};
use crate::react::prompts;
use crate::tools::SearchModality;

#[derive(Debug, Default, Deserialize)]
struct ReplanResponse {
    #[serde(default)]
    goal_achieved: bool,
    #[serde(default)]
    plan_steps: Vec<String>,
    #[serde(default)]
    plan_reasoning: String,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    matching_paper_ids: Vec<String>,
}

/// 重规划结果
#[derive(Debug, Clone, PartialEq)]
pub struct ReplanDecision {
    pub goal_achieved: bool,
    /// 达成目标时为空；否则非空
    pub remaining: Plan,
    pub reasoning: String,
    pub intent: SearchIntent,
    /// LLM 判断与规则判定不一致（规则已覆盖）
    pub overridden: bool,
    /// 本次使用了回退逻辑（LLM 失败或输出无效）
    pub used_fallback: bool,
}

/// 一次重规划所需的只读输入
pub struct ReplanInput<'a> {
    pub task: &'a str,
    pub plan: &'a Plan,
    pub completed: &'a [CompletedStep],
    pub candidates: &'a CandidateSet,
    /// 已注册工具覆盖的检索方式
    pub available: &'a BTreeSet<SearchModality>,
}

pub struct Replanner {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
    policy: GoalPolicy,
}

impl Replanner {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration, policy: GoalPolicy) -> Self {
        Self {
            llm,
            timeout,
            policy,
        }
    }

    pub async fn replan(&self, input: &ReplanInput<'_>) -> ReplanDecision {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let messages = vec![
            Message::system(prompts::replan_system(&today)),
            Message::user(prompts::replan_user(
                input.task,
                input.plan.steps(),
                &format_completed_steps(input.completed),
                &input.candidates.render(true),
            )),
        ];

        let response = match complete_with_timeout(self.llm.as_ref(), &messages, self.timeout).await {
            Ok(output) => parse_structured::<ReplanResponse>(&output),
            Err(e) => Err(e.into()),
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "replanner failed, advancing current plan");
                return self.fallback(input, format!("Replanner unavailable ({e}); continuing with the current plan."));
            }
        };

        let declared = response.intent.as_deref().and_then(SearchIntent::parse);
        let intent = self.policy.resolve_intent(
            input.task,
            declared,
            &response.matching_paper_ids,
            input.candidates,
        );
        let assessment = self.policy.assess(
            input.task,
            intent,
            input.completed,
            input.candidates,
            &response.matching_paper_ids,
            input.available,
        );
        let overridden = assessment.achieved != response.goal_achieved;
        if overridden {
            tracing::info!(
                oracle = response.goal_achieved,
                policy = assessment.achieved,
                reason = %assessment.reason,
                "goal decision overridden by policy"
            );
        }

        let reasoning = if overridden {
            format!("{} [{}]", response.plan_reasoning.trim(), assessment.reason)
                .trim()
                .to_string()
        } else {
            response.plan_reasoning
        };

        if assessment.achieved {
            return ReplanDecision {
                goal_achieved: true,
                remaining: Plan::default(),
                reasoning,
                intent,
                overridden,
                used_fallback: false,
            };
        }

        ReplanDecision {
            goal_achieved: false,
            remaining: clean_plan(response.plan_steps, input.completed),
            reasoning,
            intent,
            overridden,
            used_fallback: false,
        }
    }

    fn fallback(&self, input: &ReplanInput<'_>, reasoning: String) -> ReplanDecision {
        let advanced = input.plan.advanced();
        let remaining = if advanced.is_empty() {
            Plan::new(vec![GENERIC_STEP.to_string()])
        } else {
            advanced
        };
        ReplanDecision {
            goal_achieved: false,
            remaining,
            reasoning,
            intent: SearchIntent::classify(input.task),
            overridden: false,
            used_fallback: true,
        }
    }
}

/// 去掉非检索步骤与已完成步骤；为空时给出通用步骤
fn clean_plan(steps: Vec<String>, completed: &[CompletedStep]) -> Plan {
    let done: Vec<String> = completed.iter().map(|c| normalize_step(&c.step)).collect();
    let steps: Vec<String> = steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !is_meta_step(s) && !done.contains(&normalize_step(s)))
        .collect();
    if steps.is_empty() {
        Plan::new(vec![GENERIC_STEP.to_string()])
    } else {
        Plan::new(steps)
    }
}

fn normalize_step(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ScriptedLlmClient};
    use crate::papers::PaperRecord;

    fn available() -> BTreeSet<SearchModality> {
        BTreeSet::from([SearchModality::WebSearch, SearchModality::IndexSearch])
    }

    fn replanner(llm: ScriptedLlmClient) -> Replanner {
        Replanner::new(Arc::new(llm), Duration::from_secs(5), GoalPolicy::default())
    }

    #[tokio::test]
    async fn test_narrow_goal_achieved_with_match() {
        let llm = ScriptedLlmClient::new().reply(
            r#"{"goal_achieved": true, "intent": "narrow", "matching_paper_ids": ["b"], "plan_steps": [], "plan_reasoning": "found it"}"#,
        );
        let plan = Plan::new(vec!["Search by author".into()]);
        let completed = vec![CompletedStep::new("Search by author", "found 1")];
        let set = CandidateSet::from_records(vec![PaperRecord::new("b", "T").with_authors(["Author X"])]);
        let d = replanner(llm)
            .replan(&ReplanInput {
                task: "find papers by Author X",
                plan: &plan,
                completed: &completed,
                candidates: &set,
                available: &available(),
            })
            .await;
        assert!(d.goal_achieved);
        assert!(d.remaining.is_empty());
        assert!(!d.overridden);
        assert_eq!(d.intent, SearchIntent::Narrow);
    }

    #[tokio::test]
    async fn test_premature_claim_is_overridden() {
        let llm = ScriptedLlmClient::new().reply(
            r#"{"goal_achieved": true, "intent": "broad", "plan_steps": [], "plan_reasoning": "web search named three papers"}"#,
        );
        let plan = Plan::new(vec!["Use web search".into()]);
        let completed = vec![CompletedStep::new("Use web search", "named 3 papers")
            .with_modalities([SearchModality::WebSearch])];
        let d = replanner(llm)
            .replan(&ReplanInput {
                task: "survey of topic Y",
                plan: &plan,
                completed: &completed,
                candidates: &CandidateSet::new(),
                available: &available(),
            })
            .await;
        assert!(!d.goal_achieved);
        assert!(d.overridden);
        assert_eq!(d.remaining.steps(), &[GENERIC_STEP.to_string()]);
    }

    #[tokio::test]
    async fn test_completed_and_meta_steps_removed() {
        let llm = ScriptedLlmClient::new().reply(
            r#"{"goal_achieved": false, "plan_steps": ["Use web search", "Review results", "Search academic database for Y"], "plan_reasoning": "more"}"#,
        );
        let plan = Plan::new(vec!["Use web search".into(), "Search academic database for Y".into()]);
        let completed = vec![CompletedStep::new("Use  web search", "ctx")];
        let d = replanner(llm)
            .replan(&ReplanInput {
                task: "survey of topic Y",
                plan: &plan,
                completed: &completed,
                candidates: &CandidateSet::new(),
                available: &available(),
            })
            .await;
        assert_eq!(d.remaining.steps(), &["Search academic database for Y".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_advances_plan() {
        let plan = Plan::new(vec!["a".into(), "b".into()]);
        let input_plan = &plan;
        let r = replanner(ScriptedLlmClient::new().fail(LlmError::ApiError("down".into())));
        let d = r
            .replan(&ReplanInput {
                task: "survey",
                plan: input_plan,
                completed: &[],
                candidates: &CandidateSet::new(),
                available: &available(),
            })
            .await;
        assert!(!d.goal_achieved);
        assert!(d.used_fallback);
        assert_eq!(d.remaining.steps(), &["b".to_string()]);

        let single = Plan::new(vec!["a".into()]);
        let r = replanner(ScriptedLlmClient::new().reply("not json"));
        let d = r
            .replan(&ReplanInput {
                task: "survey",
                plan: &single,
                completed: &[],
                candidates: &CandidateSet::new(),
                available: &available(),
            })
            .await;
        assert_eq!(d.remaining.steps(), &[GENERIC_STEP.to_string()]);
    }

    #[tokio::test]
    async fn test_broad_topic_with_organisation_name_is_achievable() {
        let llm = ScriptedLlmClient::new().reply(
            r#"{"goal_achieved": true, "intent": "broad", "plan_steps": [], "plan_reasoning": "enough coverage"}"#,
        );
        let plan = Plan::new(vec!["Search academic database for RL methods".into()]);
        let completed = vec![
            CompletedStep::new("Use web search", "overview").with_modalities([SearchModality::WebSearch]),
            CompletedStep::new("Search academic database for RL methods", "found 10")
                .with_modalities([SearchModality::IndexSearch]),
        ];
        let set = CandidateSet::from_records((0..10).map(|i| PaperRecord::new(format!("r{i}"), format!("RL {i}"))));
        let d = replanner(llm)
            .replan(&ReplanInput {
                task: "A survey of reinforcement learning methods popularized by DeepMind",
                plan: &plan,
                completed: &completed,
                candidates: &set,
                available: &available(),
            })
            .await;
        assert_eq!(d.intent, SearchIntent::Broad);
        assert!(d.goal_achieved);
        assert!(!d.overridden);
    }
}
