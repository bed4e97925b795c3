use serde::Deserialize;
use sunwell_providers::{ChatMessage, CompletionOptions, ProviderRegistry};
use sunwell_types::{Goal, MemoryContext, PlanCandidate, Task, TaskMode};

#[derive(Debug, Deserialize)]
struct TaskDraft {
    description: String,
    target_path: String,
    #[serde(default)]
    mode: TaskModeDraft,
    #[serde(default)]
    depends_on_index: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaskModeDraft {
    Create,
    #[default]
    Modify,
    Read,
}

/// Builds the planner prompt: goal, then every memory constraint as a
/// `DO NOT`/`AVOID`/`FOLLOW` line so the model is steered away from
/// known dead ends before it drafts a single task.
fn build_prompt(goal: &Goal, memory: &MemoryContext) -> String {
    let mut lines = vec![format!(
        "Plan the tasks needed to accomplish: {} (category: {:?}, complexity: {:?})",
        goal.description, goal.category, goal.complexity
    )];

    for constraint in &memory.constraints {
        lines.push(constraint.as_prompt_line());
    }
    for dead_end in &memory.dead_ends {
        lines.push(dead_end.as_prompt_line());
    }
    for decision in &memory.team_decisions {
        lines.push(decision.as_prompt_line());
    }
    for learning in &memory.learnings {
        lines.push(format!("LEARNED: {} ({:?} confidence)", learning.fact, learning.confidence));
    }

    lines.push(
        "Respond with a JSON array of tasks, each with description, target_path, mode \
         (create|modify|read), and depends_on_index (indices into this array)."
            .to_string(),
    );
    lines.join("\n")
}

fn parse_tasks(raw: &str) -> Option<Vec<Task>> {
    let drafts: Vec<TaskDraft> = serde_json::from_str(raw).ok()?;
    if drafts.is_empty() {
        return None;
    }

    let mut tasks: Vec<Task> = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        let mut task = Task::new(draft.description.clone(), draft.target_path.clone(), TaskMode::Modify);
        task.mode = match draft.mode {
            TaskModeDraft::Create => TaskMode::Create,
            TaskModeDraft::Modify => TaskMode::Modify,
            TaskModeDraft::Read => TaskMode::Read,
        };
        tasks.push(task);
    }

    for (idx, draft) in drafts.iter().enumerate() {
        let ids: Vec<String> = draft
            .depends_on_index
            .iter()
            .filter(|&&i| i < tasks.len())
            .map(|&i| tasks[i].id.clone())
            .collect();
        tasks[idx].depends_on = ids;
    }

    Some(tasks)
}

/// One candidate plan's worth of tasks for a single task, synthesized
/// without a model call — the floor every generation attempt falls
/// back to when the provider returns something that won't parse.
fn fallback_tasks(goal: &Goal) -> Vec<Task> {
    vec![Task::new(
        goal.description.clone(),
        goal.planned_file_hints
            .first()
            .map(|h| h.path.clone())
            .unwrap_or_else(|| "src/lib.rs".to_string()),
        TaskMode::Modify,
    )]
}

/// Spreads `count` candidates across an ascending temperature ladder so
/// the batch samples genuinely different continuations instead of
/// replaying the same most-likely completion `count` times. The first
/// candidate stays at the provider's default (temperature `None`) so a
/// single-candidate batch still gets the model's best-guess answer.
fn temperature_for(index: usize, count: usize) -> Option<CompletionOptions> {
    if index == 0 {
        return None;
    }
    let step = 0.9 / (count.max(2) - 1) as f32;
    Some(CompletionOptions::with_temperature((index as f32 * step).min(1.0)))
}

/// Generates `count` independent candidate plans for a goal, one
/// provider call per candidate, all in flight concurrently (§5: "up to
/// N concurrent candidate generations, one task per candidate"). Each
/// call after the first is sampled at a different temperature so the
/// batch diversifies instead of returning `count` copies of one
/// completion.
pub async fn generate_candidates(
    providers: &ProviderRegistry,
    goal: &Goal,
    memory: &MemoryContext,
    count: usize,
) -> Vec<PlanCandidate> {
    let prompt = build_prompt(goal, memory);

    let calls = (0..count).map(|index| {
        let providers = providers.clone();
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.clone(),
        }];
        let options = temperature_for(index, count);
        async move { providers.complete_with_options(None, &messages, None, options).await }
    });

    let results = futures_util::future::join_all(calls).await;
    results
        .into_iter()
        .map(|result| {
            let tasks = match result {
                Ok(completion) => parse_tasks(&completion.text).unwrap_or_else(|| fallback_tasks(goal)),
                Err(err) => {
                    tracing::warn!(error = %err, "plan candidate generation fell back to a single-task plan");
                    fallback_tasks(goal)
                }
            };
            PlanCandidate::new(tasks)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sunwell_providers::MockProvider;
    use sunwell_types::{GoalCategory, GoalComplexity};

    #[tokio::test]
    async fn generates_requested_candidate_count() {
        let registry = ProviderRegistry::new();
        registry
            .register(
                Arc::new(MockProvider::new(
                    "mock",
                    r#"[{"description":"add test","target_path":"tests/a.rs","mode":"create","depends_on_index":[]}]"#,
                )),
                true,
            )
            .await;

        let goal = Goal::new("Add tests", GoalCategory::Test, GoalComplexity::Simple);
        let candidates = generate_candidates(&registry, &goal, &MemoryContext::default(), 3).await;
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].tasks.len(), 1);
        assert_eq!(candidates[0].tasks[0].target_path, "tests/a.rs");
    }

    #[tokio::test]
    async fn unparseable_response_falls_back_to_single_task() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("mock", "not json at all")), true)
            .await;

        let goal = Goal::new("Fix bug", GoalCategory::Fix, GoalComplexity::Simple);
        let candidates = generate_candidates(&registry, &goal, &MemoryContext::default(), 1).await;
        assert_eq!(candidates[0].tasks.len(), 1);
    }
}
