//! Convergence Loop: runs validation gates after writes, detects when the
//! fixer is stuck repeating the same error, and bounds fix iterations by
//! time, tokens, and iteration count.

pub mod fixer;
pub mod gate;
pub mod loop_runner;
pub mod stuck;

pub use fixer::{propose_fix, FixProposal};
pub use gate::{lint_gate, test_gate, type_gate, Gate, GateKind, GateResult, SyntaxGate};
pub use loop_runner::{ConvergenceConfig, ConvergenceLoop, ConvergenceResult, ConvergenceStatus};
pub use stuck::StuckDetector;
