//! Harmonic Planner: turns a goal plus workspace memory into a scored,
//! versioned sequence of tasks. Candidate generation, scoring, and
//! refinement are separate, independently-testable stages; this module
//! only wires them together and persists the result.

pub mod candidate;
pub mod refine;
pub mod scoring;
pub mod store;

pub use candidate::generate_candidates;
pub use refine::{refine_until_acceptable, RefinementOutcome};
pub use scoring::{compute_metrics, score, score_and_select, ScoringWeights};
pub use store::PlanVersionStore;

use std::path::Path;

use serde_json::json;
use sunwell_memory::MemoryError;
use sunwell_observability::EventBus;
use sunwell_providers::ProviderRegistry;
use sunwell_types::{Event, EventType, Goal, Lens, MemoryContext, PlanVersion, PlanVersionReason};

pub struct HarmonicPlanner {
    providers: ProviderRegistry,
    versions: PlanVersionStore,
    events: EventBus,
}

impl HarmonicPlanner {
    pub fn new(providers: ProviderRegistry, workspace_root: &Path) -> Self {
        Self::with_events(providers, workspace_root, EventBus::new())
    }

    /// Same as `new`, but publishes candidate/scoring/refine events onto
    /// the caller's bus instead of a private one nobody subscribes to.
    pub fn with_events(providers: ProviderRegistry, workspace_root: &Path, events: EventBus) -> Self {
        Self {
            providers,
            versions: PlanVersionStore::for_workspace(workspace_root),
            events,
        }
    }

    fn publish(&self, run_id: &str, event_type: EventType, data: serde_json::Value) {
        self.events.publish(Event::new(event_type, data).with_run_id(run_id.to_string()));
    }

    /// Runs the full plan-for-goal flow: refine until acceptable (or
    /// rounds exhausted), then persist the winner as the next
    /// `PlanVersion` for this goal. `run_id` tags every event emitted
    /// during the flow so a consumer can re-project per-run.
    pub async fn plan(
        &self,
        goal: &Goal,
        lens: &Lens,
        memory: &MemoryContext,
        candidates_per_round: usize,
        max_rounds: u32,
        run_id: &str,
    ) -> Result<PlanVersion, MemoryError> {
        let weights = ScoringWeights::from_lens(lens);
        self.publish(run_id, EventType::PlanRefineStart, json!({"max_rounds": max_rounds}));

        let outcome = refine_until_acceptable(
            &self.providers,
            goal,
            memory,
            &weights,
            candidates_per_round,
            max_rounds,
            &self.events,
            run_id,
        )
        .await;

        self.publish(
            run_id,
            if outcome.accepted { EventType::PlanRefineComplete } else { EventType::PlanRefineFinal },
            json!({"rounds_run": outcome.rounds_run, "score": outcome.winner.score}),
        );

        let goal_hash = goal.goal_hash();
        let reason = if self.versions.latest_for(&goal_hash).await?.is_some() {
            PlanVersionReason::Refined
        } else {
            PlanVersionReason::Initial
        };

        let version = self
            .versions
            .append_version(&goal_hash, outcome.winner.tasks, outcome.winner.score, reason)
            .await?;
        self.publish(run_id, EventType::PlanComplete, json!({"task_count": version.tasks.len(), "score": version.score}));
        Ok(version)
    }
}
