use std::path::Path;

use sunwell_memory::{JsonlStore, MemoryError};
use sunwell_types::{diff_plan_versions, PlanVersion, PlanVersionReason, Task};

/// Append-only log of every plan version ever selected for a goal,
/// keyed by `goal_hash`. Versions are never rewritten; rollback means
/// appending an old version's tasks again with `reason: Rollback`.
pub struct PlanVersionStore {
    store: JsonlStore<PlanVersion>,
}

impl PlanVersionStore {
    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self {
            store: JsonlStore::new(workspace_root.join(".sunwell").join("plans.jsonl")),
        }
    }

    pub async fn history_for(&self, goal_hash: &str) -> Result<Vec<PlanVersion>, MemoryError> {
        let all = self.store.load_all().await?;
        Ok(all.into_iter().filter(|v| v.goal_hash == goal_hash).collect())
    }

    pub async fn latest_for(&self, goal_hash: &str) -> Result<Option<PlanVersion>, MemoryError> {
        Ok(self.history_for(goal_hash).await?.into_iter().last())
    }

    pub async fn append_version(
        &self,
        goal_hash: &str,
        tasks: Vec<Task>,
        score: f64,
        reason: PlanVersionReason,
    ) -> Result<PlanVersion, MemoryError> {
        let history = self.history_for(goal_hash).await?;
        let predecessor = history.last();
        let diff = predecessor
            .map(|p| diff_plan_versions(&p.tasks, &tasks))
            .unwrap_or_default();

        let version = PlanVersion {
            goal_hash: goal_hash.to_string(),
            version: predecessor.map(|p| p.version + 1).unwrap_or(1),
            tasks,
            score,
            reason,
            diff_from_predecessor: diff,
            created_at: chrono::Utc::now(),
        };

        self.store.append(&version).await?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_types::TaskMode;

    #[tokio::test]
    async fn versions_increment_and_diff_against_predecessor() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanVersionStore::for_workspace(dir.path());

        let first = store
            .append_version(
                "hash1",
                vec![Task::new("a", "a.rs", TaskMode::Create)],
                0.8,
                PlanVersionReason::Initial,
            )
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert!(first.diff_from_predecessor.is_empty());

        let second = store
            .append_version(
                "hash1",
                vec![
                    Task::new("a", "a.rs", TaskMode::Create),
                    Task::new("b", "b.rs", TaskMode::Create),
                ],
                0.85,
                PlanVersionReason::Refined,
            )
            .await
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.diff_from_predecessor.added_task_ids.len(), 1);
    }

    #[tokio::test]
    async fn latest_for_returns_none_when_goal_has_no_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanVersionStore::for_workspace(dir.path());
        assert!(store.latest_for("unseen").await.unwrap().is_none());
    }
}
