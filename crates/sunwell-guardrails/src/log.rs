use std::path::Path;

use sunwell_memory::{JsonlStore, MemoryError};
use sunwell_types::{GuardEvolution, GuardEvolutionKind, GuardViolation};

/// Append-only record of every classifier decision that carried risk
/// above `Safe`, kept so a periodic analyzer can mine it for recurring
/// false positives and propose guard evolutions. The classifier itself
/// never reads this log on the hot path — logging happens after the
/// decision is made, never gating it.
pub struct AdaptiveGuardLog {
    store: JsonlStore<GuardViolation>,
}

impl AdaptiveGuardLog {
    pub fn for_workspace(workspace_root: &Path) -> Self {
        let path = workspace_root
            .join(".sunwell")
            .join("guardrails")
            .join("violations.jsonl");
        Self {
            store: JsonlStore::new(path),
        }
    }

    pub async fn record(&self, violation: GuardViolation) -> Result<(), MemoryError> {
        self.store.append(&violation).await
    }

    pub async fn all(&self) -> Result<Vec<GuardViolation>, MemoryError> {
        self.store.load_all().await
    }

    /// Proposes evolutions for guards that have been overridden by the
    /// user at least `threshold` times with explicit positive feedback —
    /// a cheap proxy for "this guard is over-triggering".
    pub async fn propose_evolutions(&self, threshold: usize) -> Result<Vec<GuardEvolution>, MemoryError> {
        let violations = self.store.load_all().await?;
        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for violation in &violations {
            if violation.user_feedback.as_deref() == Some("override") {
                *counts.entry(violation.guard_id.clone()).or_default() += 1;
            }
        }

        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|(guard_id, count)| GuardEvolution {
                kind: GuardEvolutionKind::RelaxRisk,
                guard_id: guard_id.clone(),
                suggestion: format!("overridden {count} times; consider relaxing risk for {guard_id}"),
                auto_applicable: false,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_violation(guard_id: &str, feedback: Option<&str>) -> GuardViolation {
        GuardViolation {
            guard_id: guard_id.to_string(),
            timestamp: Utc::now(),
            context: "writing src/lib.rs".to_string(),
            action_taken: "escalated".to_string(),
            user_feedback: feedback.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn repeated_overrides_propose_an_evolution() {
        let dir = tempfile::tempdir().unwrap();
        let log = AdaptiveGuardLog::for_workspace(dir.path());

        for _ in 0..3 {
            log.record(sample_violation("write_outside_scope", Some("override")))
                .await
                .unwrap();
        }

        let evolutions = log.propose_evolutions(3).await.unwrap();
        assert_eq!(evolutions.len(), 1);
        assert_eq!(evolutions[0].guard_id, "write_outside_scope");
    }

    #[tokio::test]
    async fn single_override_stays_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let log = AdaptiveGuardLog::for_workspace(dir.path());
        log.record(sample_violation("write_outside_scope", Some("override")))
            .await
            .unwrap();
        assert!(log.propose_evolutions(3).await.unwrap().is_empty());
    }
}
