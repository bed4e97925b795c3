use serde::{Deserialize, Serialize};

/// An architectural decision. Persistent; append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub category: String,
    pub question: String,
    pub chosen_option: String,
    #[serde(default)]
    pub rejected_options: Vec<RejectedOption>,
    pub rationale: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOption {
    pub option: String,
    pub reason: String,
}

impl Decision {
    pub fn new(
        category: impl Into<String>,
        question: impl Into<String>,
        chosen_option: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category: category.into(),
            question: question.into(),
            chosen_option: chosen_option.into(),
            rejected_options: Vec::new(),
            rationale: rationale.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// A previously failed approach, persisted to bias future planning away
/// from the same dead end. Persistent; append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedApproach {
    pub id: String,
    pub description: String,
    pub error_kind: String,
    pub root_cause: String,
    pub context: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FailedApproach {
    pub fn new(
        description: impl Into<String>,
        error_kind: impl Into<String>,
        root_cause: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            error_kind: error_kind.into(),
            root_cause: root_cause.into(),
            context: context.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningConfidence {
    Low,
    Medium,
    High,
}

/// A learned fact. May be superseded but is never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: String,
    pub fact: String,
    pub category: String,
    pub confidence: LearningConfidence,
    #[serde(default)]
    pub source_files: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}

impl Learning {
    pub fn new(
        fact: impl Into<String>,
        category: impl Into<String>,
        confidence: LearningConfidence,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fact: fact.into(),
            category: category.into(),
            confidence,
            source_files: Vec::new(),
            created_at: chrono::Utc::now(),
            superseded_by: None,
        }
    }
}

/// A team-shared decision, identical shape to `Decision` but sourced from
/// `team/shared.jsonl` rather than the workspace's own intelligence log.
pub type TeamDecision = Decision;

/// Aggregated result of querying memory for a goal: constraints derived
/// from decisions' rejected options, dead ends from failures, team
/// decisions, learnings, and patterns — everything the planner needs to
/// bias candidate generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryContext {
    pub constraints: Vec<Constraint>,
    pub dead_ends: Vec<FailedApproach>,
    pub team_decisions: Vec<TeamDecision>,
    pub learnings: Vec<Learning>,
    pub patterns: Vec<Pattern>,
}

/// A constraint derived from a decision's rejected options: "DO NOT: <reason>".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub subject: String,
    pub reason: String,
}

impl Constraint {
    pub fn as_prompt_line(&self) -> String {
        format!("DO NOT: {} — {}", self.subject, self.reason)
    }
}

impl FailedApproach {
    pub fn as_prompt_line(&self) -> String {
        format!("AVOID: {} — {}", self.description, self.root_cause)
    }
}

impl TeamDecision {
    pub fn as_prompt_line(&self) -> String {
        format!("FOLLOW: {} — {}", self.chosen_option, self.rationale)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub occurrences: u32,
}

impl MemoryContext {
    /// Paths that should be skipped by prefetch because they're known
    /// dead ends. Matches by substring against the dead end's description.
    pub fn dead_end_paths(&self) -> Vec<&str> {
        self.dead_ends
            .iter()
            .map(|f| f.description.as_str())
            .collect()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn dead_end_count(&self) -> usize {
        self.dead_ends.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_prompt_line_matches_format() {
        let c = Constraint {
            subject: "JWT".to_string(),
            reason: "team chose OAuth".to_string(),
        };
        assert_eq!(c.as_prompt_line(), "DO NOT: JWT — team chose OAuth");
    }

    #[test]
    fn failed_approach_prompt_line_matches_format() {
        let f = FailedApproach::new("using JWT", "design", "team chose OAuth", "auth module");
        assert_eq!(f.as_prompt_line(), "AVOID: using JWT — team chose OAuth");
    }
}
