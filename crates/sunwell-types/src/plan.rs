use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub coverage: f64,
    pub locality: f64,
    pub risk: f64,
    pub novelty: f64,
}

/// A candidate plan scored within one planning phase. Non-winners are
/// discarded except for event history (see `plan_candidate_scored`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCandidate {
    pub id: String,
    pub tasks: Vec<Task>,
    pub score: f64,
    pub metrics: PlanMetrics,
}

impl PlanCandidate {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tasks,
            score: 0.0,
            metrics: PlanMetrics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanVersionReason {
    Initial,
    Refined,
    UserEdit,
    Rollback,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanDiff {
    pub added_task_ids: Vec<String>,
    pub removed_task_ids: Vec<String>,
    pub modified_task_ids: Vec<String>,
}

impl PlanDiff {
    pub fn is_empty(&self) -> bool {
        self.added_task_ids.is_empty()
            && self.removed_task_ids.is_empty()
            && self.modified_task_ids.is_empty()
    }
}

/// An immutable, monotonically versioned snapshot of a selected plan,
/// keyed by goal-hash. The latest version is the operative plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanVersion {
    pub goal_hash: String,
    pub version: u32,
    pub tasks: Vec<Task>,
    pub score: f64,
    pub reason: PlanVersionReason,
    pub diff_from_predecessor: PlanDiff,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Diff two consecutive plan versions by task id. The result's
/// added ∪ modified ∪ removed equals the symmetric difference of the two
/// task-id sets for any two actually-consecutive versions (modified ids
/// are identified by a changed field within an id present in both sets).
pub fn diff_plan_versions(previous: &[Task], next: &[Task]) -> PlanDiff {
    use std::collections::HashMap;

    let prev_by_id: HashMap<&str, &Task> = previous.iter().map(|t| (t.id.as_str(), t)).collect();
    let next_by_id: HashMap<&str, &Task> = next.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut diff = PlanDiff::default();
    for (id, task) in &next_by_id {
        match prev_by_id.get(id) {
            None => diff.added_task_ids.push(id.to_string()),
            Some(prev_task) => {
                if !tasks_equal(prev_task, task) {
                    diff.modified_task_ids.push(id.to_string());
                }
            }
        }
    }
    for id in prev_by_id.keys() {
        if !next_by_id.contains_key(id) {
            diff.removed_task_ids.push(id.to_string());
        }
    }
    diff
}

fn tasks_equal(a: &Task, b: &Task) -> bool {
    a.description == b.description
        && a.target_path == b.target_path
        && a.mode == b.mode
        && a.depends_on == b.depends_on
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskMode;

    fn task(id: &str) -> Task {
        let mut t = Task::new("desc", "path.rs", TaskMode::Modify);
        t.id = id.to_string();
        t
    }

    #[test]
    fn diff_detects_added_removed_modified() {
        let previous = vec![task("a"), task("b")];
        let mut next = vec![task("a"), task("c")];
        next[0].description = "changed".to_string();

        let diff = diff_plan_versions(&previous, &next);
        assert_eq!(diff.added_task_ids, vec!["c".to_string()]);
        assert_eq!(diff.removed_task_ids, vec!["b".to_string()]);
        assert_eq!(diff.modified_task_ids, vec!["a".to_string()]);
    }

    #[test]
    fn diff_is_empty_for_identical_plans() {
        let previous = vec![task("a")];
        let next = vec![task("a")];
        assert!(diff_plan_versions(&previous, &next).is_empty());
    }
}
