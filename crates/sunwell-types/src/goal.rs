use serde::{Deserialize, Serialize};

/// A goal's coarse category, used by the planner to bias candidate
/// generation and by guardrails to set default trust expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalCategory {
    Fix,
    Test,
    Feature,
    Document,
    Refactor,
    Investigate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalComplexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
}

/// A planned file-change hint attached at intake, before any task exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeHint {
    pub path: String,
    pub reason: String,
}

/// The user's goal for one run. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub category: GoalCategory,
    pub complexity: GoalComplexity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default)]
    pub planned_file_hints: Vec<FileChangeHint>,
}

impl Goal {
    pub fn new(
        description: impl Into<String>,
        category: GoalCategory,
        complexity: GoalComplexity,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            category,
            complexity,
            lens: None,
            planned_file_hints: Vec::new(),
        }
    }

    /// Stable hash used to key plans/checkpoints to `(workspace, goal)`.
    pub fn goal_hash(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        self.description.hash(&mut hasher);
        self.category.hash_key().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl GoalCategory {
    fn hash_key(self) -> &'static str {
        match self {
            GoalCategory::Fix => "fix",
            GoalCategory::Test => "test",
            GoalCategory::Feature => "feature",
            GoalCategory::Document => "document",
            GoalCategory::Refactor => "refactor",
            GoalCategory::Investigate => "investigate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_hash_is_stable_for_same_description_and_category() {
        let a = Goal::new("Add test for utils", GoalCategory::Test, GoalComplexity::Simple);
        let mut b = a.clone();
        b.id = uuid::Uuid::new_v4().to_string();
        assert_eq!(a.goal_hash(), b.goal_hash());
    }

    #[test]
    fn goal_hash_differs_for_different_description() {
        let a = Goal::new("Add test for utils", GoalCategory::Test, GoalComplexity::Simple);
        let b = Goal::new("Update OAuth flow", GoalCategory::Fix, GoalComplexity::Moderate);
        assert_ne!(a.goal_hash(), b.goal_hash());
    }
}
