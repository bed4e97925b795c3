use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::goal::Goal;
use crate::task::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    pub project_type: Option<String>,
    pub framework: Option<String>,
    #[serde(default)]
    pub key_files: Vec<String>,
    #[serde(default)]
    pub directory_tree: Vec<String>,
}

/// Continuity artifact loaded from a prior session, if any. Sunwell's core
/// only consumes this; persistence format/detection lives with the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub mission: String,
    #[serde(default)]
    pub hazards: Vec<String>,
    #[serde(default)]
    pub hot_files: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A read-only, resolved style/policy profile. Authoring lives outside the
/// core; this struct is the consumed shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lens {
    pub name: String,
    #[serde(default)]
    pub can_spawn: bool,
    #[serde(default = "default_max_children")]
    pub max_children: u32,
    #[serde(default = "default_spawn_budget_tokens")]
    pub spawn_budget_tokens: u64,
    #[serde(default)]
    pub weight_coverage: Option<f64>,
    #[serde(default)]
    pub weight_locality: Option<f64>,
    #[serde(default)]
    pub weight_risk: Option<f64>,
    #[serde(default)]
    pub weight_novelty: Option<f64>,
    #[serde(default)]
    pub auto_approve_categories: Vec<String>,
}

fn default_max_children() -> u32 {
    3
}

fn default_spawn_budget_tokens() -> u64 {
    5_000
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            can_spawn: true,
            max_children: default_max_children(),
            spawn_budget_tokens: default_spawn_budget_tokens(),
            weight_coverage: None,
            weight_locality: None,
            weight_risk: None,
            weight_novelty: None,
            auto_approve_categories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Conservative,
    Guarded,
    Supervised,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default = "default_true")]
    pub converge: bool,
    #[serde(default)]
    pub converge_gates: Vec<String>,
    #[serde(default = "default_converge_max")]
    pub converge_max_iterations: u32,
    #[serde(default = "default_trust_level")]
    pub trust_level: TrustLevel,
    #[serde(default = "default_goal_timeout_secs")]
    pub goal_timeout_secs: u64,
    #[serde(default)]
    pub auto_resume: bool,
    #[serde(default)]
    pub json_output: bool,
}

fn default_true() -> bool {
    true
}

fn default_converge_max() -> u32 {
    10
}

fn default_trust_level() -> TrustLevel {
    TrustLevel::Guarded
}

fn default_goal_timeout_secs() -> u64 {
    30 * 60
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            converge: true,
            converge_gates: Vec::new(),
            converge_max_iterations: default_converge_max(),
            trust_level: default_trust_level(),
            goal_timeout_secs: default_goal_timeout_secs(),
            auto_resume: true,
            json_output: false,
        }
    }
}

/// One run's session bundle. Immutable identity/config after build; the
/// tail (tasks/artifacts/files_modified) grows monotonically as the
/// orchestrator drives the run. Only the orchestrator mutates the tail;
/// other components receive read views plus recorder handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub workspace_path: PathBuf,
    pub goal: Goal,
    pub workspace: WorkspaceMetadata,
    pub briefing: Option<Briefing>,
    pub lens: Lens,
    pub options: RunOptions,

    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default)]
    pub artifacts_created: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
}

impl SessionContext {
    pub fn new(workspace_path: PathBuf, goal: Goal, lens: Lens, options: RunOptions) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            workspace_path,
            goal,
            workspace: WorkspaceMetadata {
                project_type: None,
                framework: None,
                key_files: Vec::new(),
                directory_tree: Vec::new(),
            },
            briefing: None,
            lens,
            options,
            tasks: Vec::new(),
            current_task_id: None,
            artifacts_created: Vec::new(),
            files_modified: Vec::new(),
        }
    }

    /// Snapshot a subset of context keys for a spawned specialist. The
    /// child never receives the parent's full tail, only what it asks for.
    pub fn snapshot_for_child(&self, focus: &str) -> SessionContext {
        let mut child = self.clone();
        child.session_id = uuid::Uuid::new_v4().to_string();
        child.tasks = Vec::new();
        child.current_task_id = None;
        child.artifacts_created = Vec::new();
        child.files_modified = Vec::new();
        child.goal.description = format!("{} (focus: {})", self.goal.description, focus);
        child
    }

    pub fn record_artifact(&mut self, path: impl Into<String>) {
        self.artifacts_created.push(path.into());
    }

    pub fn record_file_modified(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.files_modified.contains(&path) {
            self.files_modified.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{GoalCategory, GoalComplexity};

    fn sample_session() -> SessionContext {
        let goal = Goal::new("Add tests", GoalCategory::Test, GoalComplexity::Simple);
        SessionContext::new(PathBuf::from("/tmp/ws"), goal, Lens::default(), RunOptions::default())
    }

    #[test]
    fn snapshot_for_child_clears_mutable_tail() {
        let mut parent = sample_session();
        parent.record_artifact("src/lib.rs");
        parent.record_file_modified("src/lib.rs");
        let child = parent.snapshot_for_child("narrow subtask");
        assert!(child.artifacts_created.is_empty());
        assert!(child.files_modified.is_empty());
        assert_ne!(child.session_id, parent.session_id);
        assert!(child.goal.description.contains("narrow subtask"));
    }

    #[test]
    fn record_file_modified_dedupes() {
        let mut session = sample_session();
        session.record_file_modified("a.rs");
        session.record_file_modified("a.rs");
        assert_eq!(session.files_modified.len(), 1);
    }
}
