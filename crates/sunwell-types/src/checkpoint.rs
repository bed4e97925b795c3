use serde::{Deserialize, Serialize};

use crate::goal::Goal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Orient,
    OrientComplete,
    ExplorationComplete,
    Plan,
    PlanComplete,
    DesignApproved,
    Execute,
    ImplementationComplete,
    Convergence,
    Validate,
    ReviewComplete,
    Learn,
    UserCheckpoint,
    TaskComplete,
    Complete,
}

impl Phase {
    /// The phase that should be entered after a checkpoint saved at
    /// `self` is resumed.
    pub fn successor(self) -> Phase {
        match self {
            Phase::Orient | Phase::OrientComplete => Phase::Plan,
            Phase::ExplorationComplete => Phase::Plan,
            Phase::Plan | Phase::PlanComplete | Phase::DesignApproved => Phase::Execute,
            Phase::Execute | Phase::ImplementationComplete | Phase::TaskComplete => {
                Phase::Convergence
            }
            Phase::Convergence => Phase::Validate,
            Phase::Validate | Phase::ReviewComplete => Phase::Learn,
            Phase::Learn => Phase::Complete,
            Phase::UserCheckpoint => Phase::Execute,
            Phase::Complete => Phase::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Complete,
    Escalated,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDecision {
    pub question: String,
    pub answer: String,
}

/// A serialized run snapshot keyed by `(workspace, goal)`, written
/// atomically (temp file + fsync + rename) at each phase boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCheckpoint {
    pub session_id: String,
    pub goal: Goal,
    pub phase: Phase,
    pub phase_summary: String,
    pub completed_task_ids: Vec<String>,
    #[serde(default)]
    pub user_decisions: Vec<UserDecision>,
    #[serde(default)]
    pub spawned_specialist_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_snapshot_pointer: Option<String>,
    pub checkpoint_at: chrono::DateTime<chrono::Utc>,
}

impl AgentCheckpoint {
    /// Round-trip equality up to `checkpoint_at`, matching the
    /// save/load invariant: saved and reloaded checkpoints agree on
    /// everything except the timestamp field's representation precision.
    pub fn eq_ignoring_timestamp(&self, other: &AgentCheckpoint) -> bool {
        self.session_id == other.session_id
            && self.goal.id == other.goal.id
            && self.phase == other.phase
            && self.phase_summary == other.phase_summary
            && self.completed_task_ids == other.completed_task_ids
            && self.spawned_specialist_ids == other.spawned_specialist_ids
            && self.memory_snapshot_pointer == other.memory_snapshot_pointer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistState {
    pub id: String,
    pub parent_id: String,
    pub focus: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{GoalCategory, GoalComplexity};

    fn sample_checkpoint(phase: Phase) -> AgentCheckpoint {
        AgentCheckpoint {
            session_id: "s1".to_string(),
            goal: Goal::new("fix bug", GoalCategory::Fix, GoalComplexity::Simple),
            phase,
            phase_summary: "done".to_string(),
            completed_task_ids: vec!["t1".to_string()],
            user_decisions: Vec::new(),
            spawned_specialist_ids: Vec::new(),
            memory_snapshot_pointer: None,
            checkpoint_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn successor_of_plan_complete_is_execute() {
        assert_eq!(Phase::PlanComplete.successor(), Phase::Execute);
    }

    #[test]
    fn successor_of_complete_is_complete() {
        assert_eq!(Phase::Complete.successor(), Phase::Complete);
    }

    #[test]
    fn round_trip_equality_ignores_timestamp() {
        let original = sample_checkpoint(Phase::OrientComplete);
        let mut reloaded = original.clone();
        reloaded.checkpoint_at = original.checkpoint_at + chrono::Duration::seconds(1);
        assert!(original.eq_ignoring_timestamp(&reloaded));
    }
}
