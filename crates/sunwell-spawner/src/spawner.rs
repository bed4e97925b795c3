use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sunwell_types::{Lens, SessionContext, SpecialistState};

use crate::outcome::{SpecialistOutcome, SpecialistRunner};
use crate::request::{SpawnError, SpawnRequest};

struct InFlight {
    state: SpecialistState,
    handle: JoinHandle<SpecialistOutcome>,
}

/// Delegates bounded subtasks to child agents. Enforces depth and
/// per-parent child-count caps before scheduling; the actual work is
/// delegated to a `SpecialistRunner` supplied by the caller (the
/// orchestrator), since the spawner itself has no notion of phases or
/// tool execution.
pub struct SpecialistSpawner {
    max_spawn_depth: u32,
    runner: Arc<dyn SpecialistRunner>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    children_of: Mutex<HashMap<String, u32>>,
}

impl SpecialistSpawner {
    pub fn new(runner: Arc<dyn SpecialistRunner>, max_spawn_depth: u32) -> Self {
        Self {
            max_spawn_depth,
            runner,
            in_flight: Mutex::new(HashMap::new()),
            children_of: Mutex::new(HashMap::new()),
        }
    }

    /// Schedules a child agent and returns its id immediately; the child
    /// runs concurrently. Call `wait` to collect its result. `parent_cancel`
    /// is a child token of the run's cancellation signal: cancelling the
    /// parent cancels every in-flight specialist, but a specialist can never
    /// cancel its parent or siblings.
    pub async fn spawn(
        &self,
        request: SpawnRequest,
        parent_context: &SessionContext,
        parent_depth: u32,
        lens: &Lens,
        parent_remaining_tokens: u64,
        parent_cancel: &CancellationToken,
    ) -> Result<String, SpawnError> {
        let attempted_depth = parent_depth + 1;
        if attempted_depth > self.max_spawn_depth {
            return Err(SpawnError::SpawnDepthExceeded { attempted: attempted_depth, max: self.max_spawn_depth });
        }

        {
            let mut children = self.children_of.lock().await;
            let active = children.entry(request.parent_id.clone()).or_insert(0);
            if *active >= lens.max_children {
                return Err(SpawnError::ChildCapExceeded {
                    parent_id: request.parent_id.clone(),
                    active: *active,
                    max: lens.max_children,
                });
            }
            *active += 1;
        }

        let specialist_id = uuid::Uuid::new_v4().to_string();
        let child_context = parent_context.snapshot_for_child(&request.focus);
        let token_budget = request.allocate_from(parent_remaining_tokens);

        let state = SpecialistState {
            id: specialist_id.clone(),
            parent_id: request.parent_id.clone(),
            focus: request.focus.clone(),
            started_at: chrono::Utc::now(),
            completed_at: None,
            result_summary: None,
        };

        let runner = self.runner.clone();
        let child_cancel = parent_cancel.child_token();
        let handle = tokio::spawn(async move { runner.run_specialist(child_context, token_budget, child_cancel).await });

        self.in_flight.lock().await.insert(specialist_id.clone(), InFlight { state, handle });
        tracing::info!(specialist_id = %specialist_id, parent_id = %request.parent_id, focus = %request.focus, "specialist_spawned");

        Ok(specialist_id)
    }

    /// Waits for a previously spawned specialist to complete and returns
    /// its outcome along with the now-completed `SpecialistState`. Also
    /// decrements the parent's active-child count so a later spawn can
    /// reuse the slot.
    pub async fn wait(&self, specialist_id: &str) -> Option<(SpecialistState, SpecialistOutcome)> {
        let in_flight = self.in_flight.lock().await.remove(specialist_id)?;
        let InFlight { mut state, handle } = in_flight;

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(specialist_id, error = %err, "specialist task panicked");
                SpecialistOutcome {
                    succeeded: false,
                    summary: format!("specialist task panicked: {err}"),
                    staged_memory: sunwell_memory::StagedMemory::new(),
                }
            }
        };

        state.completed_at = Some(chrono::Utc::now());
        state.result_summary = Some(outcome.summary.clone());

        let mut children = self.children_of.lock().await;
        if let Some(active) = children.get_mut(&state.parent_id) {
            *active = active.saturating_sub(1);
        }

        tracing::info!(specialist_id, succeeded = outcome.succeeded, "specialist_completed");
        Some((state, outcome))
    }
}
