use sunwell_memory::StagedMemory;
use sunwell_types::SessionContext;
use tokio_util::sync::CancellationToken;

/// What a specialist hands back to its parent once it finishes: a
/// summary to fold into `Task.integrated_result`, plus whatever it
/// staged in memory while it ran.
pub struct SpecialistOutcome {
    pub succeeded: bool,
    pub summary: String,
    pub staged_memory: StagedMemory,
}

/// The unit of work a spawned specialist actually executes. Implemented
/// by the orchestrator, which knows how to drive a child `SessionContext`
/// through the same phase machine as a top-level run; the spawner itself
/// only knows how to schedule and bound that work, not perform it.
#[async_trait::async_trait]
pub trait SpecialistRunner: Send + Sync {
    async fn run_specialist(
        &self,
        context: SessionContext,
        token_budget: u64,
        cancel: CancellationToken,
    ) -> SpecialistOutcome;
}
