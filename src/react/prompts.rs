//! Prompt 模板：规划器、重规划器、检索 Agent

const SEARCH_METHODS: &str = "\
Your assistant has access to multiple search methods:
1. General web search: understand context and discover well-known papers matching the task
2. Academic database search: find papers with keyword queries and filters (year, venue, citations, etc.)
3. Citation chasing:
   - Forward snowball: find papers that CITE seed papers (recent work building on them)
   - Backward snowball: find papers that seed papers CITE (their foundations/references)";

const STEP_GUIDELINES: &str = "\
- Every step must be a concrete search action (web search, database search, or citation chasing).
  Do NOT include steps like \"review results\", \"filter papers\", \"select seed papers\" or \"compare papers\";
  result filtering and ranking happen automatically after each step.
- Never use citation chasing (snowball) unless the user explicitly asks for related/citing/cited papers.
- The granularity of each step should let the assistant finish it within one execution.
- Preserve every task constraint (time range, authors, venues, other qualifiers) in each step it applies to.
- Keep each step concise and minimize the number of steps.";

pub fn planner_system(today: &str) -> String {
    format!(
        "You are a senior researcher. Create a plan for your research assistant to find the most relevant papers for the user's task.
You are given the task and possibly a list of papers the assistant already knows.

Today's date: {today} (use it to interpret terms like \"recent\").

{SEARCH_METHODS}

Guidelines:
- Think like a real researcher: for a general topic start with web search for context, then database search;
  for a specific paper or author use database search with title/author filters.
{STEP_GUIDELINES}

Respond with ONLY a JSON object:
{{\"plan_reasoning\": \"<why this plan>\", \"plan_steps\": [\"<step 1>\", \"<step 2>\"]}}"
    )
}

pub fn planner_user(task: &str, papers: &str) -> String {
    format!("Task: {task}\nPapers information:\n{papers}")
}

pub fn replan_system(today: &str) -> String {
    format!(
        "You are a senior researcher updating the search plan of your research assistant.
First decide whether the goal is achieved. If not, return the remaining plan.

Today's date: {today}

{SEARCH_METHODS}

CRITICAL: what counts as a retrieved paper.
A paper is retrieved ONLY when it appears in the \"Papers information\" list. Papers named in a web search
summary are just text and still need to be fetched from the academic database.

When deciding whether the goal is achieved:
- Specific paper/author lookup (intent \"narrow\"): achieved when at least one matching paper is in the list.
  List the ids of the matching papers in \"matching_paper_ids\".
- Broad topic search (intent \"broad\"): achieved when enough relevant papers are in the list AND the completed
  steps covered the core search approaches for the task.

If the goal is not achieved, update the plan:
- If a web search named specific papers/authors, make the next database step explicit, e.g.
  \"Search Semantic Scholar for papers by <author> to retrieve them into the paper list.\"
- Completed steps must NOT appear in the new plan.
{STEP_GUIDELINES}

Respond with ONLY a JSON object:
{{\"goal_achieved\": false, \"intent\": \"narrow\" | \"broad\", \"matching_paper_ids\": [], \"plan_steps\": [\"...\"], \"plan_reasoning\": \"...\"}}"
    )
}

pub fn replan_user(task: &str, plan: &[String], completed: &str, papers: &str) -> String {
    let plan_json = serde_json::to_string(plan).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Task: {task}\nCurrent Plan: {plan_json}\nCompleted Steps:\n{completed}\nPapers information:\n{papers}"
    )
}

pub fn search_agent_system(
    today: &str,
    tools_json: &str,
    call_schema: &str,
    upcoming: &[String],
    papers: &str,
) -> String {
    let upcoming_text = if upcoming.is_empty() {
        "    (none)".to_string()
    } else {
        upcoming
            .iter()
            .map(|s| format!("    - {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You are a senior research assistant who finds academic papers.
You are executing ONE step of a multi-step search plan. Your mentor handles the other steps.

Today's date: {today} (use it when applying year filters or interpreting \"recent\").

Available tools:
{tools_json}

To call tools, output ONLY a JSON object matching this schema (several calls in one turn run in parallel):
{call_schema}
Example: {{\"tool_calls\": [{{\"tool\": \"s2_search_papers\", \"args\": {{\"query\": \"graph neural networks\", \"year\": \"2021-\"}}}}]}}

IMPORTANT: a paper only enters the paper list when a database or citation tool returns it.
Papers named by web search are NOT in the list. The list below is the only ground truth.

Strict limits:
- Do NOT use citation chasing unless the current goal explicitly asks for it.
- Do NOT repeat a search with minor keyword variations; pick the best query and move on.
- Do NOT do work that belongs to an upcoming step.

Upcoming steps you must NOT do yet:
{upcoming_text}

Current papers in your list (the ONLY papers retrieved so far):
{papers}

Once the current goal is complete, stop calling tools and reply in plain text with a concise summary of
what you found and how many papers were added."
    )
}

pub fn executor_user(task: &str, goal: &str, completed: &str) -> String {
    format!("Task: {task}\nCurrent Goal: {goal}\nCompleted Steps:\n{completed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_system_embeds_date_and_format() {
        let p = planner_system("2026-10-19");
        assert!(p.contains("Today's date: 2026-10-19"));
        assert!(p.contains("\"plan_steps\""));
    }

    #[test]
    fn test_search_agent_system_lists_upcoming() {
        let p = search_agent_system("d", "[]", "{}", &["later step".to_string()], "No papers found yet");
        assert!(p.contains("    - later step"));
        assert!(p.contains("No papers found yet"));
        let none = search_agent_system("d", "[]", "{}", &[], "x");
        assert!(none.contains("(none)"));
    }

    #[test]
    fn test_replan_user_renders_plan_as_json() {
        let u = replan_user("t", &["a".to_string(), "b".to_string()], "None", "No papers found yet");
        assert!(u.contains("Current Plan: [\"a\",\"b\"]"));
    }
}
