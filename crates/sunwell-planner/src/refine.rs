use serde_json::json;
use sunwell_observability::EventBus;
use sunwell_providers::ProviderRegistry;
use sunwell_types::{Event, EventType, Goal, MemoryContext, PlanCandidate};

use crate::candidate::generate_candidates;
use crate::scoring::{score_and_select, ScoringWeights};

/// Minimum score a winning candidate must clear before refinement
/// stops. Below this, the planner regenerates a fresh batch, hoping
/// sampling variance turns up something better — refinement never
/// mutates a candidate's tasks directly, it only re-samples.
const ACCEPTABLE_SCORE: f64 = 0.5;

pub struct RefinementOutcome {
    pub winner: PlanCandidate,
    pub rounds_run: u32,
    pub accepted: bool,
}

/// Generates an initial batch, and if the winner doesn't clear
/// `ACCEPTABLE_SCORE`, regenerates up to `max_rounds - 1` more times,
/// keeping the best candidate seen across all rounds.
#[allow(clippy::too_many_arguments)]
pub async fn refine_until_acceptable(
    providers: &ProviderRegistry,
    goal: &Goal,
    memory: &MemoryContext,
    weights: &ScoringWeights,
    candidates_per_round: usize,
    max_rounds: u32,
    events: &EventBus,
    run_id: &str,
) -> RefinementOutcome {
    let mut best: Option<PlanCandidate> = None;
    let mut rounds_run = 0;

    let publish = |event_type: EventType, data: serde_json::Value| {
        events.publish(Event::new(event_type, data).with_run_id(run_id.to_string()));
    };

    for round in 0..max_rounds.max(1) {
        rounds_run = round + 1;
        publish(EventType::PlanCandidateStart, json!({"round": rounds_run, "count": candidates_per_round}));
        let mut batch = generate_candidates(providers, goal, memory, candidates_per_round).await;
        for candidate in &batch {
            publish(EventType::PlanCandidateGenerated, json!({"candidate_id": candidate.id, "task_count": candidate.tasks.len()}));
        }
        publish(EventType::PlanCandidatesComplete, json!({"round": rounds_run, "generated": batch.len()}));
        if batch.is_empty() {
            continue;
        }
        let winner_idx = score_and_select(&mut batch, weights);
        for candidate in &batch {
            publish(EventType::PlanCandidateScored, json!({"candidate_id": candidate.id, "score": candidate.score}));
        }
        publish(EventType::PlanScoringComplete, json!({"round": rounds_run, "winner_score": batch[winner_idx].score}));
        let round_winner = batch.swap_remove(winner_idx);

        let is_better = best.as_ref().map(|b| round_winner.score > b.score).unwrap_or(true);
        if is_better {
            let accepted = round_winner.score >= ACCEPTABLE_SCORE;
            best = Some(round_winner);
            if accepted {
                break;
            }
        }
        if round + 1 < max_rounds.max(1) {
            publish(EventType::PlanRefineAttempt, json!({"round": rounds_run}));
        }
    }

    let winner = best.unwrap_or_else(|| PlanCandidate::new(Vec::new()));
    let accepted = winner.score >= ACCEPTABLE_SCORE;
    RefinementOutcome { winner, rounds_run, accepted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sunwell_providers::MockProvider;
    use sunwell_types::{GoalCategory, GoalComplexity};

    #[tokio::test]
    async fn stops_as_soon_as_a_round_clears_the_threshold() {
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
        let events = sunwell_observability::EventBus::new();
        let outcome = refine_until_acceptable(
            &registry,
            &goal,
            &MemoryContext::default(),
            &ScoringWeights::default(),
            2,
            5,
            &events,
            "run-1",
        )
        .await;
        assert!(outcome.rounds_run <= 5);
        assert!(!outcome.winner.tasks.is_empty());
    }
}
