//! Agent Orchestrator: the top-level phase state machine. Owns the
//! checkpoint log, wires the planner/convergence/spawner/guardrail
//! engines together, and drives one goal through resume, orient,
//! prefetch, plan, execute, converge, validate, and learn.

pub mod checkpoints;
pub mod failure_policy;
pub mod gates;
pub mod run;
pub mod task_executor;

pub use checkpoints::CheckpointStore;
pub use failure_policy::FailurePolicy;
pub use gates::GateCommands;
pub use run::AgentOrchestrator;
pub use task_executor::{execute_task_in_process, TaskExecutionOutcome};
