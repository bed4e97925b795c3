use serde::{Deserialize, Serialize};

/// A file's in-flight content plus the task that produced it. Lives only
/// while convergence is active for it; once stable, the orchestrator
/// flushes `content` to disk and drops it from the in-memory set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub content: String,
    pub produced_by_task_id: String,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>, produced_by_task_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            produced_by_task_id: produced_by_task_id.into(),
        }
    }
}
