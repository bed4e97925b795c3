use std::collections::HashMap;

use crate::gate::GateResult;

/// Tracks how many times each `(gate, first 100 chars of error)` pair has
/// been seen across iterations. A repeated pair means the fixer keeps
/// proposing a change that doesn't address the actual error, so the loop
/// should stop retrying and escalate instead of burning more iterations.
#[derive(Debug, Default)]
pub struct StuckDetector {
    seen: HashMap<(String, String), u32>,
}

impl StuckDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn signature(gate: &str, error: &str) -> (String, String) {
        let head: String = error.chars().take(100).collect();
        (gate.to_string(), head)
    }

    /// Records this iteration's failing gates and returns `true` if any
    /// `(gate, error-prefix)` pair has now recurred `threshold` times.
    pub fn record_and_check(&mut self, failing: &[GateResult], threshold: u32) -> bool {
        let mut stuck = false;
        for result in failing {
            for error in &result.errors {
                let key = Self::signature(result.gate.as_str(), error);
                let count = self.seen.entry(key).or_insert(0);
                *count += 1;
                if *count >= threshold {
                    stuck = true;
                }
            }
        }
        stuck
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateKind;

    fn failing(gate: GateKind, error: &str) -> GateResult {
        GateResult {
            gate,
            passed: false,
            errors: vec![error.to_string()],
            duration_ms: 1,
        }
    }

    #[test]
    fn same_error_twice_triggers_stuck_at_default_threshold() {
        let mut detector = StuckDetector::new();
        assert!(!detector.record_and_check(&[failing(GateKind::Test, "assertion failed")], 2));
        assert!(detector.record_and_check(&[failing(GateKind::Test, "assertion failed")], 2));
    }

    #[test]
    fn different_errors_never_trigger_stuck() {
        let mut detector = StuckDetector::new();
        assert!(!detector.record_and_check(&[failing(GateKind::Test, "error one")], 2));
        assert!(!detector.record_and_check(&[failing(GateKind::Test, "error two")], 2));
    }

    #[test]
    fn only_the_first_hundred_chars_are_compared() {
        let mut detector = StuckDetector::new();
        let long_a = format!("{}TAIL_A", "x".repeat(100));
        let long_b = format!("{}TAIL_B", "x".repeat(100));
        assert!(!detector.record_and_check(&[failing(GateKind::Lint, &long_a)], 2));
        assert!(detector.record_and_check(&[failing(GateKind::Lint, &long_b)], 2));
    }
}
