use std::collections::HashMap;

use sunwell_memory::{MemoryError, MemoryManager};
use sunwell_types::{FailedApproach, Learning, LearningConfidence};

/// Decides whether a failed task becomes a durable `FailedApproach` or a
/// low-confidence candidate `Learning`: a single failure at a target path
/// is recorded only as a learning, since it might be an isolated mistake;
/// a second failure at the same path within the same run means the
/// approach itself is the problem, so it gets promoted to a dead end the
/// planner will actively steer around next time.
#[derive(Default)]
pub struct FailurePolicy {
    attempts_by_path: HashMap<String, u32>,
}

impl FailurePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_task_failure(
        &mut self,
        memory: &MemoryManager,
        target_path: &str,
        description: &str,
        error_kind: &str,
        root_cause: &str,
    ) -> Result<(), MemoryError> {
        let attempts = self.attempts_by_path.entry(target_path.to_string()).or_insert(0);
        *attempts += 1;

        if *attempts >= 2 {
            memory
                .record_failure(FailedApproach::new(description, error_kind, root_cause, target_path))
                .await
        } else {
            memory
                .record_learning(Learning::new(
                    format!("{description} failed once at {target_path}: {root_cause}"),
                    error_kind,
                    LearningConfidence::Low,
                ))
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_failure_at_a_path_is_only_a_candidate_learning() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryManager::for_workspace(dir.path());
        let mut policy = FailurePolicy::new();

        policy
            .record_task_failure(&memory, "src/a.rs", "add caching", "test_failure", "off-by-one")
            .await
            .unwrap();

        let goal = sunwell_types::Goal::new("g", sunwell_types::GoalCategory::Fix, sunwell_types::GoalComplexity::Simple);
        let context = memory.context_for_goal(&goal).await.unwrap();
        assert_eq!(context.learnings.len(), 1);
        assert!(context.dead_ends.is_empty());
    }

    #[tokio::test]
    async fn second_failure_at_same_path_is_promoted_to_failed_approach() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryManager::for_workspace(dir.path());
        let mut policy = FailurePolicy::new();

        for _ in 0..2 {
            policy
                .record_task_failure(&memory, "src/a.rs", "add caching", "test_failure", "off-by-one")
                .await
                .unwrap();
        }

        let goal = sunwell_types::Goal::new("g", sunwell_types::GoalCategory::Fix, sunwell_types::GoalComplexity::Simple);
        let context = memory.context_for_goal(&goal).await.unwrap();
        assert_eq!(context.dead_ends.len(), 1);
    }

    #[tokio::test]
    async fn failures_at_different_paths_stay_independent() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryManager::for_workspace(dir.path());
        let mut policy = FailurePolicy::new();

        policy.record_task_failure(&memory, "src/a.rs", "x", "e", "r").await.unwrap();
        policy.record_task_failure(&memory, "src/b.rs", "x", "e", "r").await.unwrap();

        let goal = sunwell_types::Goal::new("g", sunwell_types::GoalCategory::Fix, sunwell_types::GoalComplexity::Simple);
        let context = memory.context_for_goal(&goal).await.unwrap();
        assert!(context.dead_ends.is_empty());
        assert_eq!(context.learnings.len(), 2);
    }
}
