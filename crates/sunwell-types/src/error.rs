use thiserror::Error;

/// Closed error taxonomy (spec.md §7). Errors at gate level are consumed
/// by the convergence loop; errors at task level are consumed by the
/// orchestrator; only `Internal` and `IntegrityError` are surfaced
/// directly to the caller as a non-zero exit.
#[derive(Debug, Error)]
pub enum SunwellError {
    #[error("run cancelled by user")]
    UserAbort,

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("guardrail violation: {0}")]
    GuardrailViolation(String),

    #[error("tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("model provider error: {0}")]
    ModelError(String),

    #[error("gate failed to run: {0}")]
    GateError(String),

    #[error("integrity error (checkpoint or memory corrupt): {0}")]
    IntegrityError(String),

    #[error("convergence stuck: same error repeated")]
    Stuck,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Exit codes per spec.md §6.3.
impl SunwellError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SunwellError::UserAbort => 4,
            SunwellError::BudgetExceeded(_) => 3,
            SunwellError::GuardrailViolation(_) => 5,
            SunwellError::Stuck => 2,
            SunwellError::IntegrityError(_) | SunwellError::Internal(_) => 1,
            SunwellError::ToolExecutionError(_)
            | SunwellError::ModelError(_)
            | SunwellError::GateError(_) => 1,
            SunwellError::Io(_) | SunwellError::Serialization(_) => 1,
        }
    }

    /// Whether the caller should retry, and under what policy, per
    /// spec.md §7's retry table. Gates are never retried here —
    /// convergence handles repetition at a higher level.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            SunwellError::ModelError(_) => RetryPolicy::exponential(3),
            SunwellError::ToolExecutionError(_) => RetryPolicy::fixed(2),
            SunwellError::Io(_) => RetryPolicy::fixed(1),
            _ => RetryPolicy::none(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub exponential_backoff: bool,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            exponential_backoff: false,
        }
    }

    pub fn fixed(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            exponential_backoff: false,
        }
    }

    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            exponential_backoff: true,
        }
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        if !self.exponential_backoff {
            return std::time::Duration::from_millis(0);
        }
        std::time::Duration::from_millis(100 * 2u64.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(SunwellError::GuardrailViolation("x".into()).exit_code(), 5);
        assert_eq!(SunwellError::Stuck.exit_code(), 2);
        assert_eq!(SunwellError::BudgetExceeded("x".into()).exit_code(), 3);
        assert_eq!(SunwellError::UserAbort.exit_code(), 4);
    }

    #[test]
    fn model_errors_retry_with_backoff() {
        let policy = SunwellError::ModelError("timeout".into()).retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.exponential_backoff);
        assert!(policy.backoff_for_attempt(1) > policy.backoff_for_attempt(0));
    }

    #[test]
    fn gate_errors_are_never_retried_here() {
        let policy = SunwellError::GateError("timeout".into()).retry_policy();
        assert_eq!(policy.max_attempts, 0);
    }
}
