use std::path::Path;

use sunwell_memory::{JsonlStore, MemoryError};
use sunwell_types::{AgentCheckpoint, Phase};

/// Keeps at most this many checkpoints per goal; older ones are dropped
/// on the next save, oldest first.
const MAX_PER_GOAL: usize = 5;

/// Append-only checkpoint log, pruned per-goal on every save. A real
/// atomic-write-then-rename durability story belongs to `JsonlStore`
/// (append is sequential and crash-safe enough for a local dev tool);
/// this layer only adds the keyed lookup and retention policy.
pub struct CheckpointStore {
    store: JsonlStore<AgentCheckpoint>,
}

impl CheckpointStore {
    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self {
            store: JsonlStore::new(workspace_root.join(".sunwell").join("checkpoints.jsonl")),
        }
    }

    async fn all_for_goal(&self, goal_id: &str) -> Result<Vec<AgentCheckpoint>, MemoryError> {
        let all = self.store.load_all().await?;
        Ok(all.into_iter().filter(|c| c.goal.id == goal_id).collect())
    }

    /// Finds the most recent checkpoint for `(workspace, goal)` — the
    /// workspace is implicit in which store this is, since each workspace
    /// gets its own `.sunwell/checkpoints.jsonl`.
    pub async fn latest_for_goal(&self, goal_id: &str) -> Result<Option<AgentCheckpoint>, MemoryError> {
        Ok(self.all_for_goal(goal_id).await?.into_iter().last())
    }

    /// Finds the most recent checkpoint whose goal description matches,
    /// for callers (the `resume` CLI command) that only have the goal's
    /// text, not the session-scoped id it was checkpointed under.
    pub async fn latest_for_description(&self, description: &str) -> Result<Option<AgentCheckpoint>, MemoryError> {
        let all = self.store.load_all().await?;
        Ok(all.into_iter().filter(|c| c.goal.description == description).last())
    }

    /// Appends a new checkpoint. Retention is enforced by rewriting the
    /// file with only the most recent `MAX_PER_GOAL` entries for this
    /// goal (plus every entry for other goals untouched).
    pub async fn save(&self, checkpoint: AgentCheckpoint) -> Result<(), MemoryError> {
        let goal_id = checkpoint.goal.id.clone();
        let mut all = self.store.load_all().await?;
        all.push(checkpoint);

        let mut this_goal: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, c)| c.goal.id == goal_id)
            .map(|(idx, _)| idx)
            .collect();
        if this_goal.len() > MAX_PER_GOAL {
            let drop_count = this_goal.len() - MAX_PER_GOAL;
            let to_drop: std::collections::HashSet<usize> = this_goal.drain(..drop_count).collect();
            all = all
                .into_iter()
                .enumerate()
                .filter(|(idx, _)| !to_drop.contains(idx))
                .map(|(_, c)| c)
                .collect();
        }

        self.store.rewrite(&all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::{Goal, GoalCategory, GoalComplexity};

    fn checkpoint(goal_id: &str, phase: Phase) -> AgentCheckpoint {
        let mut goal = Goal::new("fix it", GoalCategory::Fix, GoalComplexity::Simple);
        goal.id = goal_id.to_string();
        AgentCheckpoint {
            session_id: "s1".to_string(),
            goal,
            phase,
            phase_summary: "summary".to_string(),
            completed_task_ids: Vec::new(),
            user_decisions: Vec::new(),
            spawned_specialist_ids: Vec::new(),
            memory_snapshot_pointer: None,
            checkpoint_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn latest_for_goal_returns_the_most_recently_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_workspace(dir.path());
        store.save(checkpoint("g1", Phase::Orient)).await.unwrap();
        store.save(checkpoint("g1", Phase::PlanComplete)).await.unwrap();

        let latest = store.latest_for_goal("g1").await.unwrap().unwrap();
        assert_eq!(latest.phase, Phase::PlanComplete);
    }

    #[tokio::test]
    async fn retains_at_most_five_checkpoints_per_goal() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_workspace(dir.path());
        for _ in 0..8 {
            store.save(checkpoint("g1", Phase::Execute)).await.unwrap();
        }
        let remaining = store.all_for_goal("g1").await.unwrap();
        assert_eq!(remaining.len(), 5);
    }

    #[tokio::test]
    async fn checkpoints_for_other_goals_are_untouched_by_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::for_workspace(dir.path());
        store.save(checkpoint("other", Phase::Orient)).await.unwrap();
        for _ in 0..6 {
            store.save(checkpoint("g1", Phase::Execute)).await.unwrap();
        }
        assert_eq!(store.all_for_goal("other").await.unwrap().len(), 1);
        assert_eq!(store.all_for_goal("g1").await.unwrap().len(), 5);
    }
}
