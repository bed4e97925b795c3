use sunwell_types::Risk;

/// Confidence floor a classification's risk tier must clear to
/// auto-approve. `Dangerous`/`Forbidden` have no floor: they're handled
/// as special cases in `evaluate` instead of a threshold comparison.
const SAFE_MIN_CONFIDENCE: f64 = 0.70;
const MODERATE_MIN_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationDecision {
    AutoApproved,
    RequiresApproval,
    Blocked,
}

/// Decides whether an artifact can land without a human in the loop,
/// given its action classification and a confidence score from
/// convergence/validation (1.0 when every gate passed clean, lower when
/// gates failed or ran in a degraded mode).
pub struct VerificationGate;

impl VerificationGate {
    pub fn evaluate(risk: Risk, confidence: f64) -> VerificationDecision {
        match risk {
            Risk::Forbidden => VerificationDecision::Blocked,
            Risk::Dangerous => VerificationDecision::RequiresApproval,
            Risk::Moderate => {
                if confidence >= MODERATE_MIN_CONFIDENCE {
                    VerificationDecision::AutoApproved
                } else {
                    VerificationDecision::RequiresApproval
                }
            }
            Risk::Safe => {
                if confidence >= SAFE_MIN_CONFIDENCE {
                    VerificationDecision::AutoApproved
                } else {
                    VerificationDecision::RequiresApproval
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_always_blocked_regardless_of_confidence() {
        assert_eq!(VerificationGate::evaluate(Risk::Forbidden, 1.0), VerificationDecision::Blocked);
    }

    #[test]
    fn dangerous_never_auto_approves() {
        assert_eq!(VerificationGate::evaluate(Risk::Dangerous, 1.0), VerificationDecision::RequiresApproval);
    }

    #[test]
    fn safe_auto_approves_at_or_above_its_threshold() {
        assert_eq!(VerificationGate::evaluate(Risk::Safe, 0.70), VerificationDecision::AutoApproved);
        assert_eq!(VerificationGate::evaluate(Risk::Safe, 0.69), VerificationDecision::RequiresApproval);
    }

    #[test]
    fn moderate_auto_approves_at_or_above_its_higher_threshold() {
        assert_eq!(VerificationGate::evaluate(Risk::Moderate, 0.85), VerificationDecision::AutoApproved);
        assert_eq!(VerificationGate::evaluate(Risk::Moderate, 0.84), VerificationDecision::RequiresApproval);
    }
}
