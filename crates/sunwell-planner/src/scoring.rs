use sunwell_types::{Lens, PlanCandidate, PlanMetrics};

/// Default weight vector: risk and locality dominate novelty, per the
/// framing that a plan's blast radius matters more than how creative
/// its approach is. A lens may override any subset of these.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub coverage: f64,
    pub locality: f64,
    pub risk: f64,
    pub novelty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            coverage: 0.4,
            locality: 0.25,
            risk: 0.25,
            novelty: 0.1,
        }
    }
}

impl ScoringWeights {
    pub fn from_lens(lens: &Lens) -> Self {
        let defaults = Self::default();
        Self {
            coverage: lens.weight_coverage.unwrap_or(defaults.coverage),
            locality: lens.weight_locality.unwrap_or(defaults.locality),
            risk: lens.weight_risk.unwrap_or(defaults.risk),
            novelty: lens.weight_novelty.unwrap_or(defaults.novelty),
        }
    }
}

/// Heuristic metrics for one candidate: coverage tracks how many
/// distinct target paths it touches relative to its task count
/// (higher is more thorough), locality rewards plans that stay within
/// few directories, risk penalizes shell/db-touching task counts
/// (approximated here by task count itself, since the classifier has
/// not run yet at planning time), novelty rewards candidates that
/// diverge from the others in the same batch.
pub fn compute_metrics(candidate: &PlanCandidate, batch: &[PlanCandidate]) -> PlanMetrics {
    let task_count = candidate.tasks.len().max(1) as f64;

    let distinct_paths = candidate
        .tasks
        .iter()
        .map(|t| t.target_path.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len() as f64;
    let coverage = (distinct_paths / task_count).min(1.0);

    let distinct_dirs = candidate
        .tasks
        .iter()
        .map(|t| t.target_path.rsplit_once('/').map(|(d, _)| d).unwrap_or(""))
        .collect::<std::collections::HashSet<_>>()
        .len() as f64;
    let locality = 1.0 - ((distinct_dirs - 1.0).max(0.0) / task_count).min(1.0);

    let risk = (task_count / 10.0).min(1.0);

    let own_paths: std::collections::HashSet<&str> =
        candidate.tasks.iter().map(|t| t.target_path.as_str()).collect();
    let others_paths: std::collections::HashSet<&str> = batch
        .iter()
        .filter(|c| c.id != candidate.id)
        .flat_map(|c| c.tasks.iter().map(|t| t.target_path.as_str()))
        .collect();
    let unique_to_this = own_paths.difference(&others_paths).count() as f64;
    let novelty = if own_paths.is_empty() {
        0.0
    } else {
        unique_to_this / own_paths.len() as f64
    };

    PlanMetrics { coverage, locality, risk, novelty }
}

pub fn score(metrics: &PlanMetrics, weights: &ScoringWeights) -> f64 {
    weights.coverage * metrics.coverage + weights.locality * metrics.locality
        - weights.risk * metrics.risk
        + weights.novelty * metrics.novelty
}

/// Scores every candidate in place and returns the index of the winner.
/// Ties break toward the earlier-generated candidate, keeping selection
/// deterministic for equally-scored batches.
pub fn score_and_select(candidates: &mut [PlanCandidate], weights: &ScoringWeights) -> usize {
    let snapshot = candidates.to_vec();
    for candidate in candidates.iter_mut() {
        let metrics = compute_metrics(candidate, &snapshot);
        let s = score(&metrics, weights);
        candidate.metrics = metrics;
        candidate.score = s;
    }

    let mut best_idx = 0;
    let mut best_score = f64::MIN;
    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.score > best_score {
            best_score = candidate.score;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::{Task, TaskMode};

    fn candidate(paths: &[&str]) -> PlanCandidate {
        PlanCandidate::new(
            paths
                .iter()
                .map(|p| Task::new("do it", *p, TaskMode::Modify))
                .collect(),
        )
    }

    #[test]
    fn default_weights_favor_coverage_over_novelty() {
        let weights = ScoringWeights::default();
        assert!(weights.coverage > weights.novelty);
        assert_eq!(weights.coverage + weights.locality + weights.risk + weights.novelty, 1.0);
    }

    #[test]
    fn focused_plan_scores_higher_than_sprawling_one_at_equal_coverage() {
        let weights = ScoringWeights::default();
        let focused = candidate(&["src/a.rs", "src/b.rs"]);
        let sprawling = candidate(&["src/a.rs", "tests/b.rs", "docs/c.md"]);
        let batch = vec![focused.clone(), sprawling.clone()];

        let focused_score = score(&compute_metrics(&focused, &batch), &weights);
        let sprawling_score = score(&compute_metrics(&sprawling, &batch), &weights);
        assert!(focused_score >= sprawling_score);
    }

    #[test]
    fn score_and_select_picks_the_highest_scorer() {
        let weights = ScoringWeights::default();
        let mut candidates = vec![candidate(&["src/a.rs"]), candidate(&["src/a.rs", "src/b.rs"])];
        let winner = score_and_select(&mut candidates, &weights);
        assert_eq!(winner, 1);
    }
}
