//! Shared data model, event vocabulary, and error taxonomy for the
//! Sunwell execution core. No engine logic lives here — this crate is
//! the equivalent of `tandem-types` at the root of the dependency graph:
//! every other `sunwell-*` crate depends on it, it depends on nothing in
//! this workspace.

pub mod artifact;
pub mod checkpoint;
pub mod error;
pub mod event;
pub mod goal;
pub mod guardrail;
pub mod memory;
pub mod plan;
pub mod retry;
pub mod session;
pub mod task;

pub use artifact::Artifact;
pub use checkpoint::{AgentCheckpoint, Phase, RunStatus, SpecialistState, UserDecision};
pub use error::{RetryPolicy, SunwellError};
pub use event::{Event, EventSeverity, EventType, UiHints};
pub use goal::{FileChangeHint, Goal, GoalCategory, GoalComplexity};
pub use guardrail::{
    ActionClassification, CandidateAction, Escalation, EscalationOption, EscalationReason,
    EscalationSeverity, GuardEvolution, GuardEvolutionKind, GuardViolation, Risk,
    ScopeCheckResult, TrustZone,
};
pub use memory::{
    Constraint, Decision, FailedApproach, Learning, LearningConfidence, MemoryContext, Pattern,
    RejectedOption, TeamDecision,
};
pub use plan::{diff_plan_versions, PlanCandidate, PlanDiff, PlanMetrics, PlanVersion, PlanVersionReason};
pub use retry::with_retry;
pub use session::{Briefing, Lens, RunOptions, SessionContext, TrustLevel, WorkspaceMetadata};
pub use task::{ready_tasks, IntegratedResult, Task, TaskMode, TaskStatus};
