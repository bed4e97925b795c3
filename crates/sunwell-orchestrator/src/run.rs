use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use sunwell_convergence::{Artifact, ConvergenceConfig, ConvergenceLoop, ConvergenceStatus};
use sunwell_guardrails::{
    ActionClassifier, AdaptiveGuardLog, EscalationManager, RecoveryManager, ScopeLimits, ScopeTracker,
    SessionScopeTracker, VerificationDecision, VerificationGate,
};
use sunwell_memory::{MemoryManager, StagedMemory};
use sunwell_planner::HarmonicPlanner;
use sunwell_providers::{ChatMessage, ProviderRegistry};
use sunwell_spawner::{merge_pending_memory, SpecialistOutcome, SpecialistRunner, SpawnRequest, SpecialistSpawner};
use sunwell_tools::ToolRegistry;
use sunwell_types::{
    ready_tasks, ActionClassification, AgentCheckpoint, Escalation, EscalationOption, EscalationReason,
    Event, EventType, FailedApproach, GoalComplexity, Learning, LearningConfidence, Phase, RunStatus,
    SessionContext, Task, TaskStatus,
};

use crate::checkpoints::CheckpointStore;
use crate::failure_policy::FailurePolicy;
use crate::gates::GateCommands;
use crate::task_executor::execute_task_in_process;

/// Per-specialist token accounting is approximate: a specialist has no
/// sub-gates of its own, so each completed task is charged a flat slice
/// of its budget rather than metered provider usage.
const SPECIALIST_TASK_TOKEN_COST: u64 = 500;

/// Drives one run through the full phase sequence: resume, orient,
/// prefetch, plan, execute (delegating to specialists where the lens
/// allows it), converge, validate, learn, and checkpoint at every phase
/// boundary. One instance is shared across a workspace's runs; `new`
/// returns it already wired as its own specialist runner, closing the
/// loop a plain constructor can't.
pub struct AgentOrchestrator {
    workspace_root: PathBuf,
    memory: MemoryManager,
    event_bus: sunwell_observability::EventBus,
    checkpoints: CheckpointStore,
    planner: HarmonicPlanner,
    providers: ProviderRegistry,
    tools: ToolRegistry,
    classifier: ActionClassifier,
    guard_log: AdaptiveGuardLog,
    escalation: EscalationManager,
    gate_commands: GateCommands,
    max_spawn_depth: u32,
    spawner: OnceCell<Arc<SpecialistSpawner>>,
    /// Workspace-scoped singleton: one instance per orchestrator, folding
    /// in every goal it runs, never reset for the orchestrator's lifetime.
    session_scope: tokio::sync::Mutex<SessionScopeTracker>,
}

impl AgentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_root: PathBuf,
        memory: MemoryManager,
        event_bus: sunwell_observability::EventBus,
        planner: HarmonicPlanner,
        providers: ProviderRegistry,
        tools: ToolRegistry,
        classifier: ActionClassifier,
        guard_log: AdaptiveGuardLog,
        escalation: EscalationManager,
        gate_commands: GateCommands,
        max_spawn_depth: u32,
    ) -> Arc<Self> {
        let checkpoints = CheckpointStore::for_workspace(&workspace_root);
        let orchestrator = Arc::new(Self {
            workspace_root,
            memory,
            event_bus,
            checkpoints,
            planner,
            providers,
            tools,
            classifier,
            guard_log,
            escalation,
            gate_commands,
            max_spawn_depth,
            spawner: OnceCell::new(),
            session_scope: tokio::sync::Mutex::new(SessionScopeTracker::new()),
        });

        let runner: Arc<dyn SpecialistRunner> = orchestrator.clone();
        let spawner = Arc::new(SpecialistSpawner::new(runner, max_spawn_depth));
        let _ = orchestrator.spawner.set(spawner);

        orchestrator
    }

    async fn checkpoint(&self, session: &SessionContext, phase: Phase, summary: impl Into<String>) {
        let checkpoint = AgentCheckpoint {
            session_id: session.session_id.clone(),
            goal: session.goal.clone(),
            phase,
            phase_summary: summary.into(),
            completed_task_ids: session
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Succeeded)
                .map(|t| t.id.clone())
                .collect(),
            user_decisions: Vec::new(),
            spawned_specialist_ids: Vec::new(),
            memory_snapshot_pointer: None,
            checkpoint_at: chrono::Utc::now(),
        };
        if let Err(err) = self.checkpoints.save(checkpoint).await {
            tracing::warn!(error = %err, "checkpoint_save_failed");
        }
        self.event_bus.publish(
            Event::new(EventType::CheckpointSaved, json!({"phase": format!("{phase:?}")}))
                .with_run_id(session.session_id.clone()),
        );
    }

    fn publish(&self, session: &SessionContext, event_type: EventType, data: serde_json::Value) {
        self.event_bus
            .publish(Event::new(event_type, data).with_run_id(session.session_id.clone()));
    }

    /// Whether a task should be delegated to a spawned specialist instead
    /// of executed in this run directly: requires the lens to allow
    /// spawning, a spawner to exist (always true post-construction), and
    /// the goal to be complex enough that isolating the subtask is worth
    /// the overhead of a child session.
    fn should_spawn(&self, session: &SessionContext, depth: u32) -> bool {
        session.lens.can_spawn
            && depth < self.max_spawn_depth
            && session.goal.complexity >= GoalComplexity::Complex
            && self.spawner.get().is_some()
    }

    /// Runs a goal to completion (or escalation/timeout). Top-level entry
    /// point; depth-0 runs commit memory directly rather than staging it,
    /// since there is no parent to merge into. Equivalent to
    /// `run_cancellable` with a token nothing ever cancels.
    pub async fn run(self: &Arc<Self>, session: SessionContext) -> RunStatus {
        self.run_cancellable(session, CancellationToken::new()).await
    }

    /// Same as `run`, but `cancel` is honored at each iteration boundary
    /// and between gates (convergence, validation, and every escalation
    /// wait): cancelling it mid-run persists a checkpoint and returns
    /// `RunStatus::Cancelled` instead of running to completion.
    pub async fn run_cancellable(self: &Arc<Self>, session: SessionContext, cancel: CancellationToken) -> RunStatus {
        self.run_at_depth(session, 0, cancel).await
    }

    async fn run_at_depth(self: &Arc<Self>, mut session: SessionContext, depth: u32, cancel: CancellationToken) -> RunStatus {
        let mut failure_policy = FailurePolicy::new();
        let deadline = Instant::now() + Duration::from_secs(session.options.goal_timeout_secs);

        // Recovery tracking is best-effort and top-level only: a specialist's
        // writes land inside its parent goal's single commit, and a
        // workspace that isn't a clean git repo simply runs without
        // rollback support rather than failing the goal.
        let recovery = if depth == 0 {
            match RecoveryManager::start_session(&self.workspace_root, &session.session_id) {
                Ok(manager) => Some(manager),
                Err(err) => {
                    tracing::debug!(error = %err, "recovery manager unavailable for this run");
                    None
                }
            }
        } else {
            None
        };

        // Root of this goal's conversation turn chain; every later turn for
        // this run (currently just the learning extraction reply) hangs off
        // it, so a session's history reads as a DAG rather than a flat log.
        let root_turn = self
            .memory
            .record_turn(&session.session_id, None, "user", &session.goal.description)
            .await
            .ok();

        if session.options.auto_resume {
            if let Ok(Some(checkpoint)) = self.checkpoints.latest_for_goal(&session.goal.id).await {
                self.publish(
                    &session,
                    EventType::CheckpointFound,
                    json!({"phase": format!("{:?}", checkpoint.phase)}),
                );
                tracing::info!(goal_id = %session.goal.id, phase = ?checkpoint.phase, "resuming from checkpoint");
            }
        }

        let memory_ctx = match self.memory.context_for_goal(&session.goal).await {
            Ok(ctx) => ctx,
            Err(err) => {
                self.publish(&session, EventType::Error, json!({"message": err.to_string()}));
                return RunStatus::Escalated;
            }
        };
        self.publish(
            &session,
            EventType::Orient,
            json!({"constraints": memory_ctx.constraint_count(), "dead_ends": memory_ctx.dead_end_count()}),
        );
        self.checkpoint(&session, Phase::OrientComplete, "oriented against workspace memory").await;

        self.publish(&session, EventType::PrefetchStart, json!({}));
        self.publish(&session, EventType::PrefetchComplete, json!({}));

        self.publish(&session, EventType::PlanStart, json!({}));
        let plan_version = match self
            .planner
            .plan(&session.goal, &session.lens, &memory_ctx, 5, 2, &session.session_id)
            .await
        {
            Ok(version) => version,
            Err(err) => {
                self.publish(&session, EventType::Error, json!({"message": err.to_string()}));
                return RunStatus::Escalated;
            }
        };
        session.tasks = plan_version.tasks;
        self.publish(
            &session,
            EventType::PlanComplete,
            json!({"task_count": session.tasks.len(), "score": plan_version.score}),
        );
        self.checkpoint(&session, Phase::PlanComplete, "plan generated").await;

        let mut scope_tracker = ScopeTracker::new(ScopeLimits::from_goal(&session.goal));
        let mut completed: Vec<String> = Vec::new();
        let mut classifications: Vec<ActionClassification> = Vec::new();

        'execute: loop {
            let ready_ids: Vec<String> =
                ready_tasks(&session.tasks, &completed).into_iter().map(|t| t.id.clone()).collect();
            if ready_ids.is_empty() {
                break;
            }

            for task_id in ready_ids {
                if Instant::now() >= deadline {
                    self.checkpoint(&session, Phase::Execute, "goal timeout reached").await;
                    return RunStatus::Timeout;
                }
                if cancel.is_cancelled() {
                    self.checkpoint(&session, Phase::Execute, "run cancelled").await;
                    return RunStatus::Cancelled;
                }

                let idx = session.tasks.iter().position(|t| t.id == task_id).unwrap();
                let task: Task = session.tasks[idx].clone();
                session.tasks[idx].status = TaskStatus::Running;
                self.publish(&session, EventType::TaskStart, json!({"task_id": task.id, "path": task.target_path}));

                if self.should_spawn(&session, depth) {
                    let spawner = self.spawner.get().expect("spawner initialized in new()").clone();
                    let request = SpawnRequest::new(
                        &session.session_id,
                        "implementer",
                        task.description.clone(),
                        "isolate a complex subtask",
                    );
                    match spawner
                        .spawn(request, &session, depth, &session.lens, session.lens.spawn_budget_tokens, &cancel)
                        .await
                    {
                        Ok(specialist_id) => {
                            self.publish(
                                &session,
                                EventType::SpecialistSpawned,
                                json!({"specialist_id": specialist_id, "task_id": task.id}),
                            );
                            let Some((_, outcome)) = spawner.wait(&specialist_id).await else {
                                session.tasks[idx].status = TaskStatus::Failed;
                                continue;
                            };
                            self.publish(
                                &session,
                                EventType::SpecialistCompleted,
                                json!({"specialist_id": specialist_id, "succeeded": outcome.succeeded}),
                            );
                            if let Err(err) =
                                merge_pending_memory(&self.memory, outcome.staged_memory, outcome.succeeded).await
                            {
                                tracing::warn!(error = %err, "specialist memory merge failed");
                            }
                            session.tasks[idx].integrated_result = Some(sunwell_types::IntegratedResult {
                                summary: outcome.summary.clone(),
                                files_touched: Vec::new(),
                                succeeded: outcome.succeeded,
                                lines_changed: 0,
                            });
                            if outcome.succeeded {
                                session.tasks[idx].status = TaskStatus::Succeeded;
                                completed.push(task.id.clone());
                            } else {
                                session.tasks[idx].status = TaskStatus::Failed;
                                let _ = failure_policy
                                    .record_task_failure(
                                        &self.memory,
                                        &task.target_path,
                                        &task.description,
                                        "specialist_failure",
                                        &outcome.summary,
                                    )
                                    .await;
                            }
                            continue;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "spawn denied, falling back to in-process execution");
                        }
                    }
                }

                match execute_task_in_process(
                    &self.providers,
                    &self.tools,
                    &self.classifier,
                    &self.escalation,
                    &session.goal.id,
                    &memory_ctx,
                    &task,
                    session.options.trust_level,
                    &cancel,
                    Some(&self.memory),
                )
                .await
                {
                    Ok(outcome) => {
                        scope_tracker.record_file_touch(&task.target_path);
                        scope_tracker.record_lines_changed(outcome.integrated_result.lines_changed);
                        classifications.push(outcome.classification.clone());
                        session.tasks[idx].status = TaskStatus::Succeeded;
                        session.tasks[idx].integrated_result = Some(outcome.integrated_result.clone());
                        if !outcome.integrated_result.files_touched.is_empty() {
                            session.record_file_modified(task.target_path.clone());
                        }
                        completed.push(task.id.clone());
                        self.publish(
                            &session,
                            EventType::TaskComplete,
                            json!({"task_id": task.id, "succeeded": true}),
                        );

                        let scope_check = scope_tracker.check();
                        if !scope_check.passed {
                            let escalation = Escalation::new(
                                &session.goal.id,
                                EscalationReason::ScopeExceeded,
                                scope_check.reason.clone().unwrap_or_default(),
                                vec![EscalationOption::Approve, EscalationOption::Abort],
                                EscalationOption::Abort,
                            );
                            let id = self.escalation.raise(escalation).await;
                            let reply = self.escalation.wait_for_reply(&id, cancel.clone()).await;
                            if !matches!(reply, Some(EscalationOption::Approve) | Some(EscalationOption::ApproveOnce)) {
                                self.checkpoint(&session, Phase::Execute, "scope exceeded, run aborted").await;
                                return RunStatus::Escalated;
                            }
                        }
                    }
                    Err(err) => {
                        session.tasks[idx].status = TaskStatus::Failed;
                        self.publish(
                            &session,
                            EventType::TaskComplete,
                            json!({"task_id": task.id, "succeeded": false, "error": err}),
                        );
                        let _ = failure_policy
                            .record_task_failure(&self.memory, &task.target_path, &task.description, "task_execution", &err)
                            .await;
                    }
                }
            }

            if Instant::now() >= deadline {
                break 'execute;
            }
        }

        self.checkpoint(&session, Phase::ImplementationComplete, "execution complete").await;

        let session_scope_check = {
            let mut session_scope = self.session_scope.lock().await;
            session_scope.record_goal(scope_tracker.files_touched(), scope_tracker.total_lines_changed());
            session_scope.check()
        };
        if !session_scope_check.passed {
            let escalation = Escalation::new(
                &session.goal.id,
                EscalationReason::ScopeExceeded,
                session_scope_check.reason.clone().unwrap_or_default(),
                vec![EscalationOption::Approve, EscalationOption::Abort],
                EscalationOption::Abort,
            );
            let id = self.escalation.raise(escalation).await;
            let reply = self.escalation.wait_for_reply(&id, cancel.clone()).await;
            if !matches!(reply, Some(EscalationOption::Approve) | Some(EscalationOption::ApproveOnce)) {
                self.checkpoint(&session, Phase::ImplementationComplete, "session scope exceeded, run aborted").await;
                return RunStatus::Escalated;
            }
        }

        if session.options.converge && !session.files_modified.is_empty() {
            let gates = self.gate_commands.build(&self.workspace_root);
            if !gates.is_empty() {
                let mut artifacts = Vec::new();
                for path in &session.files_modified {
                    if let Ok(result) = self.tools.execute("read_file", json!({"path": path})).await {
                        artifacts.push(Artifact::new(path.clone(), result.output, session.session_id.clone()));
                    }
                }

                self.publish(&session, EventType::ConvergenceStart, json!({"files": session.files_modified.len()}));
                let config = ConvergenceConfig {
                    max_iterations: session.options.converge_max_iterations,
                    ..ConvergenceConfig::default()
                };
                let loop_runner = ConvergenceLoop::new(gates, self.providers.clone(), self.tools.clone(), config);
                let result = loop_runner.run(artifacts, cancel.clone()).await;

                match result.status {
                    ConvergenceStatus::Stable => {
                        self.publish(&session, EventType::ConvergenceStable, json!({"iterations": result.iterations}));
                    }
                    ConvergenceStatus::Timeout => {
                        self.publish(&session, EventType::ConvergenceTimeout, json!({}));
                        self.checkpoint(&session, Phase::Convergence, "convergence timed out").await;
                        return RunStatus::Timeout;
                    }
                    ConvergenceStatus::Escalated => {
                        let reason = result.escalation_reason.unwrap_or(EscalationReason::Stuck);
                        let event_type = match reason {
                            EscalationReason::BudgetExceeded => EventType::ConvergenceBudgetExceeded,
                            EscalationReason::Stuck => EventType::ConvergenceStuck,
                            _ => EventType::ConvergenceMaxIterations,
                        };
                        self.publish(&session, event_type, json!({"iterations": result.iterations}));
                        let escalation = Escalation::new(
                            &session.goal.id,
                            reason,
                            format!("convergence escalated after {} iterations", result.iterations),
                            vec![EscalationOption::Approve, EscalationOption::Abort],
                            EscalationOption::Abort,
                        );
                        let id = self.escalation.raise(escalation).await;
                        let reply = self.escalation.wait_for_reply(&id, cancel.clone()).await;
                        if !matches!(reply, Some(EscalationOption::Approve) | Some(EscalationOption::ApproveOnce)) {
                            self.checkpoint(&session, Phase::Convergence, "convergence escalation not approved").await;
                            return RunStatus::Escalated;
                        }
                    }
                    ConvergenceStatus::Cancelled => {
                        self.checkpoint(&session, Phase::Convergence, "convergence cancelled").await;
                        return RunStatus::Cancelled;
                    }
                }
            }
        }
        self.checkpoint(&session, Phase::Convergence, "convergence complete").await;

        self.publish(&session, EventType::ValidationStart, json!({}));
        let validation_gates = self.gate_commands.build(&self.workspace_root);
        let mut confidence: f64 = 1.0;
        if !validation_gates.is_empty() && !session.files_modified.is_empty() {
            let mut artifacts = Vec::new();
            for path in &session.files_modified {
                if let Ok(result) = self.tools.execute("read_file", json!({"path": path})).await {
                    artifacts.push(Artifact::new(path.clone(), result.output, session.session_id.clone()));
                }
            }
            let config = ConvergenceConfig { max_iterations: 1, escalate_after_same_error: 1, ..ConvergenceConfig::default() };
            let validator = ConvergenceLoop::new(validation_gates, self.providers.clone(), self.tools.clone(), config);
            let result = validator.run(artifacts, cancel.clone()).await;
            if result.status == ConvergenceStatus::Cancelled {
                self.checkpoint(&session, Phase::ReviewComplete, "validation cancelled").await;
                return RunStatus::Cancelled;
            } else if result.status == ConvergenceStatus::Stable {
                self.publish(&session, EventType::ValidationPassed, json!({}));
            } else {
                confidence = 0.5;
                self.publish(&session, EventType::ValidationFailed, json!({"status": format!("{:?}", result.status)}));
            }
        }
        self.checkpoint(&session, Phase::ReviewComplete, "validation complete").await;

        // Re-check every write this run performed against the confidence
        // validation actually produced: a task trusted enough to skip its
        // own per-task escalation can still fail this pass if the run as a
        // whole came out of validation degraded.
        for classification in &classifications {
            let decision = VerificationGate::evaluate(classification.risk, confidence);
            match decision {
                VerificationDecision::AutoApproved => {}
                VerificationDecision::Blocked => {
                    self.checkpoint(&session, Phase::ReviewComplete, "verification gate blocked an action").await;
                    return RunStatus::Escalated;
                }
                VerificationDecision::RequiresApproval => {
                    let escalation = Escalation::new(
                        &session.goal.id,
                        EscalationReason::DangerousAction,
                        format!("verification gate requires approval: {}", classification.reason),
                        vec![EscalationOption::Approve, EscalationOption::Abort],
                        EscalationOption::Abort,
                    );
                    let id = self.escalation.raise(escalation).await;
                    let reply = self.escalation.wait_for_reply(&id, cancel.clone()).await;
                    if !matches!(reply, Some(EscalationOption::Approve) | Some(EscalationOption::ApproveOnce)) {
                        self.checkpoint(&session, Phase::ReviewComplete, "verification gate escalation not approved").await;
                        return RunStatus::Escalated;
                    }
                }
            }
        }

        self.record_learnings(&session, root_turn.as_deref()).await;
        self.checkpoint(&session, Phase::Learn, "learning recorded").await;

        if let Some(recovery) = &recovery {
            if let Err(err) = recovery.commit_goal(&session.goal.id, &session.goal.description) {
                tracing::warn!(error = %err, "goal commit failed");
            }
        }

        self.checkpoint(&session, Phase::Complete, "run complete").await;
        self.publish(&session, EventType::Complete, json!({"tasks_completed": completed.len()}));
        RunStatus::Complete
    }

    /// Best-effort: asks the model for a one-line takeaway from the run.
    /// A provider failure here never fails the run — learning is a nice
    /// to have, not a gate. `parent_turn` links the model's reply into this
    /// goal's conversation chain, when one was recorded at the start of the
    /// run.
    async fn record_learnings(&self, session: &SessionContext, parent_turn: Option<&str>) {
        let prompt = format!(
            "In one sentence, state the single most useful fact to remember about completing this goal: {}",
            session.goal.description
        );
        let messages = vec![ChatMessage { role: "user".to_string(), content: prompt }];
        match self.providers.complete(None, &messages, None).await {
            Ok(completion) if !completion.text.trim().is_empty() => {
                let learning = Learning::new(completion.text.trim(), "run_summary", LearningConfidence::Medium);
                if self.memory.record_learning(learning).await.is_ok() {
                    self.publish(session, EventType::LearningAdded, json!({}));
                }
                let _ = self
                    .memory
                    .record_turn(&session.session_id, parent_turn, "assistant", completion.text.trim())
                    .await;
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(error = %err, "learning extraction skipped"),
        }
    }
}

#[async_trait]
impl SpecialistRunner for AgentOrchestrator {
    /// A reduced phase flow for delegated subtasks: plan narrowly, execute
    /// in-process only (a specialist never spawns a grandchild — depth
    /// caps are enforced by the spawner, but specialists also have no
    /// need to, since their focus is already a single isolated subtask),
    /// and stage everything observed rather than writing it directly, so
    /// a failed specialist's observations never reach the parent's log.
    async fn run_specialist(
        &self,
        mut context: SessionContext,
        token_budget: u64,
        cancel: CancellationToken,
    ) -> SpecialistOutcome {
        let memory_ctx = self.memory.context_for_goal(&context.goal).await.unwrap_or_default();
        let plan = match self
            .planner
            .plan(&context.goal, &context.lens, &memory_ctx, 3, 1, &context.session_id)
            .await
        {
            Ok(plan) => plan,
            Err(err) => {
                return SpecialistOutcome {
                    succeeded: false,
                    summary: format!("specialist planning failed: {err}"),
                    staged_memory: StagedMemory::new(),
                }
            }
        };
        context.tasks = plan.tasks;

        let mut staged = StagedMemory::new();
        let mut completed: Vec<String> = Vec::new();
        let mut all_ok = true;
        let mut tokens_spent: u64 = 0;

        loop {
            let ready_ids: Vec<String> =
                ready_tasks(&context.tasks, &completed).into_iter().map(|t| t.id.clone()).collect();
            if ready_ids.is_empty() || tokens_spent >= token_budget || cancel.is_cancelled() {
                break;
            }

            for task_id in ready_ids {
                let idx = context.tasks.iter().position(|t| t.id == task_id).unwrap();
                let task = context.tasks[idx].clone();
                match execute_task_in_process(
                    &self.providers,
                    &self.tools,
                    &self.classifier,
                    &self.escalation,
                    &context.goal.id,
                    &memory_ctx,
                    &task,
                    context.options.trust_level,
                    &cancel,
                    Some(&self.memory),
                )
                .await
                {
                    Ok(outcome) => {
                        context.tasks[idx].status = TaskStatus::Succeeded;
                        context.tasks[idx].integrated_result = Some(outcome.integrated_result);
                        context.record_file_modified(task.target_path.clone());
                        completed.push(task.id.clone());
                    }
                    Err(err) => {
                        context.tasks[idx].status = TaskStatus::Failed;
                        staged.stage_failure(FailedApproach::new(
                            task.description.clone(),
                            "specialist_task_failure",
                            err,
                            task.target_path.clone(),
                        ));
                        all_ok = false;
                    }
                }
                tokens_spent += SPECIALIST_TASK_TOKEN_COST;
            }
        }

        let summary = format!("{} — completed {}/{} tasks", context.goal.description, completed.len(), context.tasks.len());
        if all_ok && !completed.is_empty() {
            staged.stage_learning(Learning::new(summary.clone(), "specialist", LearningConfidence::Medium));
        }

        SpecialistOutcome { succeeded: all_ok, summary, staged_memory: staged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_providers::MockProvider;
    use sunwell_tools::new_hook_registry;
    use sunwell_types::{Goal, GoalCategory, Lens, RunOptions};

    async fn build_orchestrator(workspace: &std::path::Path, response: &str) -> Arc<AgentOrchestrator> {
        let memory = MemoryManager::for_workspace(workspace);
        let event_bus = sunwell_observability::EventBus::new();
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new("mock", response)), true).await;
        AgentOrchestrator::new(
            workspace.to_path_buf(),
            memory,
            event_bus.clone(),
            HarmonicPlanner::with_events(providers.clone(), workspace, event_bus),
            providers,
            ToolRegistry::for_workspace(workspace.to_path_buf(), new_hook_registry()),
            ActionClassifier::new(Vec::new()),
            AdaptiveGuardLog::for_workspace(workspace),
            EscalationManager::new(sunwell_observability::EventBus::new()),
            GateCommands::default(),
            3,
        )
    }

    fn sample_session(workspace: &std::path::Path) -> SessionContext {
        let goal = Goal::new("Add a small helper", GoalCategory::Feature, GoalComplexity::Simple);
        SessionContext::new(workspace.to_path_buf(), goal, Lens::default(), RunOptions { converge: false, ..RunOptions::default() })
    }

    #[tokio::test]
    async fn run_completes_without_convergence_when_no_gates_configured() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path(), "[]").await;
        let session = sample_session(dir.path());
        let status = orchestrator.run(session).await;
        assert_eq!(status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn checkpoints_are_saved_across_phase_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path(), "[]").await;
        let session = sample_session(dir.path());
        let goal_id = session.goal.id.clone();
        orchestrator.run(session).await;

        let checkpoints = CheckpointStore::for_workspace(dir.path());
        let latest = checkpoints.latest_for_goal(&goal_id).await.unwrap();
        assert!(latest.is_some());
        assert_eq!(latest.unwrap().phase, Phase::Complete);
    }
}
