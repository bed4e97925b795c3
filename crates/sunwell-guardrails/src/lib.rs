pub mod classifier;
pub mod escalation;
pub mod log;
pub mod recovery;
pub mod scope;
pub mod verification_gate;

pub use classifier::ActionClassifier;
pub use escalation::EscalationManager;
pub use log::AdaptiveGuardLog;
pub use recovery::{RecoveryError, RecoveryManager};
pub use scope::{ScopeLimits, ScopeTracker, SessionScopeTracker};
pub use verification_gate::{VerificationDecision, VerificationGate};
