use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// UI hints carried alongside an event. The core never renders these,
/// it only attaches them for a downstream terminal/front-end to use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

/// Closed event vocabulary (spec.md §6.2). `data` stays an open-schema
/// map at the wire boundary; typed accessors are provided per event kind
/// for consumers that want them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Signal,
    Orient,
    PrefetchStart,
    PrefetchComplete,
    PrefetchTimeout,
    PlanStart,
    PlanCandidateStart,
    PlanCandidateGenerated,
    PlanCandidatesComplete,
    PlanCandidateScored,
    PlanScoringComplete,
    PlanRefineStart,
    PlanRefineAttempt,
    PlanRefineComplete,
    PlanRefineFinal,
    PlanComplete,
    TaskStart,
    TaskComplete,
    SpecialistSpawned,
    SpecialistCompleted,
    ValidationStart,
    ValidationPassed,
    ValidationFailed,
    ConvergenceStart,
    ConvergenceIterationStart,
    ConvergenceIterationComplete,
    ConvergenceFixing,
    ConvergenceStable,
    ConvergenceTimeout,
    ConvergenceStuck,
    ConvergenceMaxIterations,
    ConvergenceBudgetExceeded,
    LearningAdded,
    DecisionMade,
    FailureRecorded,
    CheckpointFound,
    CheckpointSaved,
    PhaseComplete,
    Escalate,
    Complete,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<EventSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHints>,
}

impl Event {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: chrono::Utc::now(),
            run_id: None,
            specialist_id: None,
            severity: None,
            ui: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_specialist_id(mut self, specialist_id: impl Into<String>) -> Self {
        self.specialist_id = Some(specialist_id.into());
        self
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// One JSONL line, newline-terminated, UTF-8 — the on-disk shape of
    /// `.sunwell/events.jsonl`.
    pub fn to_jsonl_line(&self) -> serde_json::Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_stable_type_tag() {
        let event = Event::new(EventType::PlanComplete, serde_json::json!({"taskCount": 3}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "plan_complete");
    }

    #[test]
    fn jsonl_line_is_newline_terminated() {
        let event = Event::new(EventType::Complete, serde_json::json!({}));
        let line = event.to_jsonl_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
