use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Safe,
    Moderate,
    Dangerous,
    Forbidden,
}

/// What kind of action is being classified. Semantic actions (e.g.
/// `db_schema`) exist alongside filesystem/shell ones so the classifier
/// can reason about intent, not just the literal tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateAction {
    WriteFile { path: String },
    EditFile { path: String },
    ReadFile { path: String },
    RunShell { command: String },
    DbSchema { description: String },
    NetworkCall { target: String },
}

impl CandidateAction {
    pub fn path(&self) -> Option<&str> {
        match self {
            CandidateAction::WriteFile { path } | CandidateAction::EditFile { path } => {
                Some(path.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionClassification {
    pub action_type: String,
    pub risk: Risk,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub reason: String,
    pub escalation_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_rule: Option<String>,
}

/// A path glob with an associated risk override and autonomy permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustZone {
    pub glob: String,
    pub risk_override: Risk,
    pub allowed_in_autonomous: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    ForbiddenAction,
    DangerousAction,
    ScopeExceeded,
    LowConfidence,
    ProtectedPath,
    MissingTests,
    BudgetExceeded,
    Stuck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationOption {
    Approve,
    ApproveOnce,
    Skip,
    Modify,
    Abort,
    Relax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub id: String,
    pub goal_id: String,
    pub reason: EscalationReason,
    pub details: String,
    pub options: Vec<EscalationOption>,
    pub recommended_option: EscalationOption,
    pub severity: EscalationSeverity,
}

impl Escalation {
    pub fn severity_for_reason(reason: EscalationReason) -> EscalationSeverity {
        match reason {
            EscalationReason::ForbiddenAction => EscalationSeverity::Critical,
            EscalationReason::DangerousAction => EscalationSeverity::Warning,
            _ => EscalationSeverity::Info,
        }
    }

    pub fn new(
        goal_id: impl Into<String>,
        reason: EscalationReason,
        details: impl Into<String>,
        options: Vec<EscalationOption>,
        recommended_option: EscalationOption,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal_id: goal_id.into(),
            reason,
            details: details.into(),
            severity: Self::severity_for_reason(reason),
            options,
            recommended_option,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeCheckResult {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<String>,
}

impl ScopeCheckResult {
    pub fn ok() -> Self {
        Self {
            passed: true,
            reason: None,
            limit_type: None,
        }
    }

    pub fn violated(limit_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
            limit_type: Some(limit_type.into()),
        }
    }
}

/// A record of one classifier decision, kept in an append-only adaptive
/// guard log for the periodic analyzer to mine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardViolation {
    pub guard_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context: String,
    pub action_taken: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardEvolutionKind {
    RefinePattern,
    AddException,
    RelaxRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardEvolution {
    pub kind: GuardEvolutionKind,
    pub guard_id: String,
    pub suggestion: String,
    pub auto_applicable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_and_dangerous_map_to_expected_severity() {
        assert_eq!(
            Escalation::severity_for_reason(EscalationReason::ForbiddenAction),
            EscalationSeverity::Critical
        );
        assert_eq!(
            Escalation::severity_for_reason(EscalationReason::DangerousAction),
            EscalationSeverity::Warning
        );
        assert_eq!(
            Escalation::severity_for_reason(EscalationReason::ScopeExceeded),
            EscalationSeverity::Info
        );
    }

    #[test]
    fn risk_ordering_places_forbidden_highest() {
        assert!(Risk::Forbidden > Risk::Dangerous);
        assert!(Risk::Dangerous > Risk::Moderate);
        assert!(Risk::Moderate > Risk::Safe);
    }
}
