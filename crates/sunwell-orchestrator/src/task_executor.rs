use sunwell_guardrails::{ActionClassifier, EscalationManager};
use sunwell_memory::MemoryManager;
use sunwell_providers::{ChatMessage, ProviderRegistry};
use sunwell_tools::ToolRegistry;
use sunwell_types::{
    ActionClassification, CandidateAction, Escalation, EscalationOption, EscalationReason,
    IntegratedResult, MemoryContext, Risk, Task, TaskMode, TrustLevel,
};
use tokio_util::sync::CancellationToken;

pub struct TaskExecutionOutcome {
    pub integrated_result: IntegratedResult,
    pub classification: ActionClassification,
}

fn action_for(task: &Task) -> CandidateAction {
    match task.mode {
        TaskMode::Read => CandidateAction::ReadFile { path: task.target_path.clone() },
        TaskMode::Create | TaskMode::Modify => CandidateAction::WriteFile { path: task.target_path.clone() },
    }
}

fn build_prompt(task: &Task, memory: &MemoryContext) -> String {
    let mut lines = vec![format!(
        "Implement this task: {}\nTarget file: {} (mode: {:?})\nRespond with the full file content only.",
        task.description, task.target_path, task.mode
    )];
    for constraint in &memory.constraints {
        lines.push(constraint.as_prompt_line());
    }
    for dead_end in &memory.dead_ends {
        lines.push(format!("AVOID: {} — {}", dead_end.description, dead_end.root_cause));
    }
    lines.join("\n")
}

/// Runs one task in-process: classifies the write it would perform,
/// gates dangerous/forbidden actions through the escalation manager
/// (auto-approving nothing at `Conservative` trust), asks the model for
/// content, and applies it through the tool executor so the write-hook
/// fires exactly once.
#[allow(clippy::too_many_arguments)]
pub async fn execute_task_in_process(
    providers: &ProviderRegistry,
    tools: &ToolRegistry,
    classifier: &ActionClassifier,
    escalation: &EscalationManager,
    goal_id: &str,
    memory: &MemoryContext,
    task: &Task,
    trust_level: TrustLevel,
    cancel: &CancellationToken,
    response_cache: Option<&MemoryManager>,
) -> Result<TaskExecutionOutcome, String> {
    let action = action_for(task);
    let classification = classifier.classify(&action);

    if classification.risk == Risk::Forbidden {
        return Err(format!("forbidden action blocked: {}", classification.reason));
    }

    if classification.risk == Risk::Dangerous && trust_level != TrustLevel::Full {
        let escalation_request = Escalation::new(
            goal_id,
            EscalationReason::DangerousAction,
            classification.reason.clone(),
            vec![EscalationOption::Approve, EscalationOption::Skip, EscalationOption::Abort],
            EscalationOption::Skip,
        );
        let id = escalation.raise(escalation_request).await;
        let reply = escalation.wait_for_reply(&id, cancel.clone()).await;
        match reply {
            Some(EscalationOption::Approve) | Some(EscalationOption::ApproveOnce) => {}
            _ => return Err("dangerous action was not approved".to_string()),
        }
    }

    if task.mode == TaskMode::Read {
        let result = tools
            .execute("read_file", serde_json::json!({"path": task.target_path}))
            .await
            .map_err(|err| err.to_string())?;
        return Ok(TaskExecutionOutcome {
            integrated_result: IntegratedResult {
                summary: format!("read {} ({} bytes)", task.target_path, result.output.len()),
                files_touched: Vec::new(),
                succeeded: true,
                lines_changed: 0,
            },
            classification,
        });
    }

    let prompt = build_prompt(task, memory);

    let cached = match response_cache {
        Some(mem) => mem.cached_response("default", None, &prompt).await.unwrap_or(None),
        None => None,
    };
    let completion_text = match cached {
        Some(text) => text,
        None => {
            let messages = vec![ChatMessage { role: "user".to_string(), content: prompt.clone() }];
            let completion = providers
                .complete(None, &messages, None)
                .await
                .map_err(|err| format!("model call failed: {err}"))?;
            if let Some(mem) = response_cache {
                let token_count = u32::try_from(completion.usage.total_tokens).unwrap_or(u32::MAX);
                let _ = mem.cache_response("default", None, &prompt, &completion.text, token_count).await;
            }
            completion.text
        }
    };

    let result = tools
        .execute(
            "write_file",
            serde_json::json!({"path": task.target_path, "content": completion_text}),
        )
        .await
        .map_err(|err| err.to_string())?;

    if result.output != "ok" {
        return Err(result.output);
    }

    Ok(TaskExecutionOutcome {
        integrated_result: IntegratedResult {
            summary: format!("wrote {}", task.target_path),
            files_touched: vec![task.target_path.clone()],
            succeeded: true,
            lines_changed: completion_text.lines().count(),
        },
        classification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sunwell_observability::EventBus;
    use sunwell_providers::MockProvider;
    use sunwell_tools::new_hook_registry;

    #[tokio::test]
    async fn safe_write_task_succeeds_without_escalation() {
        let dir = tempfile::tempdir().unwrap();
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new("mock", "fn main() {}")), true).await;
        let tools = ToolRegistry::for_workspace(dir.path().to_path_buf(), new_hook_registry());
        let classifier = ActionClassifier::new(Vec::new());
        let escalation = EscalationManager::new(EventBus::new());

        let task = Task::new("write main", "src/main.rs", TaskMode::Create);
        let outcome = execute_task_in_process(
            &providers,
            &tools,
            &classifier,
            &escalation,
            "goal1",
            &MemoryContext::default(),
            &task,
            TrustLevel::Guarded,
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        assert!(outcome.integrated_result.succeeded);
        assert_eq!(outcome.classification.risk, Risk::Moderate);
    }

    #[tokio::test]
    async fn forbidden_path_never_reaches_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let providers = ProviderRegistry::new();
        let tools = ToolRegistry::for_workspace(dir.path().to_path_buf(), new_hook_registry());
        let classifier = ActionClassifier::new(vec![sunwell_types::TrustZone {
            glob: "secrets/*".to_string(),
            risk_override: Risk::Forbidden,
            allowed_in_autonomous: false,
            reason: "credential material".to_string(),
        }]);
        let escalation = EscalationManager::new(EventBus::new());

        let task = Task::new("leak secret", "secrets/key.pem", TaskMode::Create);
        let result = execute_task_in_process(
            &providers,
            &tools,
            &classifier,
            &escalation,
            "goal1",
            &MemoryContext::default(),
            &task,
            TrustLevel::Full,
            &CancellationToken::new(),
            None,
        )
        .await;
        assert!(result.is_err());
    }
}
