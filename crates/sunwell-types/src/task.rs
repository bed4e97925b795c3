use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    Create,
    Modify,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
}

/// The result of integrating a completed task (or specialist) back into
/// the parent's plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedResult {
    pub summary: String,
    #[serde(default)]
    pub files_touched: Vec<String>,
    pub succeeded: bool,
    #[serde(default)]
    pub lines_changed: usize,
}

/// The smallest unit the orchestrator executes as one step. Produced by
/// the planner; mutated only by the orchestrator to attach results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub target_path: String,
    pub mode: TaskMode,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_pending")]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrated_result: Option<IntegratedResult>,
}

fn default_pending() -> TaskStatus {
    TaskStatus::Pending
}

impl Task {
    pub fn new(description: impl Into<String>, target_path: impl Into<String>, mode: TaskMode) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            target_path: target_path.into(),
            mode,
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            integrated_result: None,
        }
    }

    /// A task is ready when every dependency id is present in `completed`.
    pub fn is_ready(&self, completed: &[String]) -> bool {
        self.status == TaskStatus::Pending
            && self.depends_on.iter().all(|dep| completed.contains(dep))
    }
}

/// Find all currently-ready tasks given the set of completed task ids.
pub fn ready_tasks<'a>(tasks: &'a [Task], completed: &[String]) -> Vec<&'a Task> {
    tasks.iter().filter(|t| t.is_ready(completed)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ready_when_dependencies_satisfied() {
        let mut task = Task::new("implement fix", "src/lib.rs", TaskMode::Modify);
        task.depends_on = vec!["t1".to_string()];
        assert!(!task.is_ready(&[]));
        assert!(task.is_ready(&["t1".to_string()]));
    }

    #[test]
    fn ready_tasks_filters_by_completion() {
        let mut a = Task::new("a", "a.rs", TaskMode::Create);
        a.id = "a".to_string();
        let mut b = Task::new("b", "b.rs", TaskMode::Create);
        b.id = "b".to_string();
        b.depends_on = vec!["a".to_string()];
        let tasks = vec![a, b];
        let ready = ready_tasks(&tasks, &[]);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "a");
        let ready_after_a = ready_tasks(&tasks, &["a".to_string()]);
        assert_eq!(ready_after_a.len(), 1);
        assert_eq!(ready_after_a[0].id, "b");
    }
}
