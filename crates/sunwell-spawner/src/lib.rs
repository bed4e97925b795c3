//! Specialist Spawner: parent-to-child agent delegation bounded by spawn
//! depth and per-lens child-count caps, with staged memory that merges
//! into the parent's log only once the child succeeds.

pub mod merge;
pub mod outcome;
pub mod request;
pub mod spawner;

pub use merge::merge_pending_memory;
pub use outcome::{SpecialistOutcome, SpecialistRunner};
pub use request::{SpawnError, SpawnRequest};
pub use spawner::SpecialistSpawner;
