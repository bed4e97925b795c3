use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use sunwell_providers::ProviderRegistry;
use sunwell_tools::ToolRegistry;
use sunwell_types::{Artifact, EscalationReason};

use crate::fixer::propose_fix;
use crate::gate::{Gate, GateResult};
use crate::stuck::StuckDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Stable,
    Escalated,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConvergenceResult {
    pub status: ConvergenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    pub iterations: u32,
    pub duration_ms: u64,
    pub tokens_used: u64,
}

#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    pub max_iterations: u32,
    pub max_tokens: u64,
    pub timeout_seconds: u64,
    pub escalate_after_same_error: u32,
    pub debounce_ms: u64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_tokens: 50_000,
            timeout_seconds: 600,
            escalate_after_same_error: 2,
            debounce_ms: 200,
        }
    }
}

/// Drives gates to a stable fixed point, invoking the Model to propose
/// fixes between rounds. Only files reported changed within the current
/// iteration are revalidated next round; when a fixer round writes
/// nothing, the loop falls back to revalidating the initial file set so
/// a silent no-op fix can't wedge it forever.
pub struct ConvergenceLoop {
    gates: Vec<Box<dyn Gate>>,
    providers: ProviderRegistry,
    tools: ToolRegistry,
    config: ConvergenceConfig,
}

impl ConvergenceLoop {
    pub fn new(
        gates: Vec<Box<dyn Gate>>,
        providers: ProviderRegistry,
        tools: ToolRegistry,
        config: ConvergenceConfig,
    ) -> Self {
        Self { gates, providers, tools, config }
    }

    /// Runs the loop to a fixed point, honoring `cancel` at every
    /// iteration boundary and again between gate execution and fixing —
    /// the two suspension points §5 calls out by name. Pass
    /// `CancellationToken::new()` for a run with no external cancel
    /// source.
    pub async fn run(&self, artifacts: Vec<Artifact>, cancel: CancellationToken) -> ConvergenceResult {
        let start = Instant::now();
        let mut artifacts = artifacts;
        let initial_paths: Vec<String> = artifacts.iter().map(|a| a.path.clone()).collect();
        let mut changed = initial_paths.clone();
        let mut detector = StuckDetector::new();
        let mut tokens_used: u64 = 0;
        let mut iterations: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return self.finish(ConvergenceStatus::Cancelled, None, iterations, start, tokens_used);
            }
            if start.elapsed() >= Duration::from_secs(self.config.timeout_seconds) {
                return self.finish(ConvergenceStatus::Timeout, None, iterations, start, tokens_used);
            }
            if tokens_used >= self.config.max_tokens {
                return self.finish(
                    ConvergenceStatus::Escalated,
                    Some(EscalationReason::BudgetExceeded),
                    iterations,
                    start,
                    tokens_used,
                );
            }
            if iterations >= self.config.max_iterations {
                return self.finish(ConvergenceStatus::Escalated, None, iterations, start, tokens_used);
            }

            let targets = if changed.is_empty() { initial_paths.clone() } else { changed.clone() };
            let results: Vec<GateResult> = tokio::select! {
                _ = cancel.cancelled() => {
                    return self.finish(ConvergenceStatus::Cancelled, None, iterations, start, tokens_used);
                }
                results = futures_join_all(&self.gates, &targets) => results,
            };
            iterations += 1;

            let failing: Vec<GateResult> = results.into_iter().filter(|r| !r.passed).collect();
            if failing.is_empty() {
                return self.finish(ConvergenceStatus::Stable, None, iterations, start, tokens_used);
            }

            if detector.record_and_check(&failing, self.config.escalate_after_same_error) {
                return self.finish(
                    ConvergenceStatus::Escalated,
                    Some(EscalationReason::Stuck),
                    iterations,
                    start,
                    tokens_used,
                );
            }

            if cancel.is_cancelled() {
                return self.finish(ConvergenceStatus::Cancelled, None, iterations, start, tokens_used);
            }

            let proposal = propose_fix(&self.providers, &failing, &artifacts).await;
            tokens_used += proposal.tokens_used;

            changed = Vec::new();
            for (path, content) in proposal.files {
                if let Ok(result) = self
                    .tools
                    .execute("write_file", serde_json::json!({"path": path, "content": content.clone()}))
                    .await
                {
                    if result.output == "ok" {
                        changed.push(path.clone());
                        match artifacts.iter_mut().find(|a| a.path == path) {
                            Some(existing) => existing.content = content,
                            None => artifacts.push(Artifact::new(path.clone(), content, "")),
                        }
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.finish(ConvergenceStatus::Cancelled, None, iterations, start, tokens_used);
                }
                _ = tokio::time::sleep(Duration::from_millis(self.config.debounce_ms)) => {}
            }
        }
    }

    fn finish(
        &self,
        status: ConvergenceStatus,
        escalation_reason: Option<EscalationReason>,
        iterations: u32,
        start: Instant,
        tokens_used: u64,
    ) -> ConvergenceResult {
        ConvergenceResult {
            status,
            escalation_reason,
            iterations,
            duration_ms: start.elapsed().as_millis() as u64,
            tokens_used,
        }
    }
}

async fn futures_join_all(gates: &[Box<dyn Gate>], changed_files: &[String]) -> Vec<GateResult> {
    let futures = gates.iter().map(|gate| gate.run(changed_files));
    futures_util::future::join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunwell_tools::new_hook_registry;
    use std::sync::Arc;
    use sunwell_providers::MockProvider;

    #[tokio::test]
    async fn all_gates_passing_on_first_round_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let gates: Vec<Box<dyn Gate>> = vec![crate::gate::lint_gate(dir.path().to_path_buf(), "true")];
        let providers = ProviderRegistry::new();
        let tools = ToolRegistry::for_workspace(dir.path().to_path_buf(), new_hook_registry());
        let loop_runner = ConvergenceLoop::new(gates, providers, tools, ConvergenceConfig::default());

        let result = loop_runner.run(vec![Artifact::new("a.rs", "fn main() {}", "t1")], CancellationToken::new()).await;
        assert_eq!(result.status, ConvergenceStatus::Stable);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn repeated_identical_failure_escalates_as_stuck() {
        let dir = tempfile::tempdir().unwrap();
        let gates: Vec<Box<dyn Gate>> =
            vec![crate::gate::lint_gate(dir.path().to_path_buf(), "echo same_error 1>&2; exit 1")];
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new("mock", "not json")), true).await;
        let tools = ToolRegistry::for_workspace(dir.path().to_path_buf(), new_hook_registry());
        let loop_runner = ConvergenceLoop::new(gates, providers, tools, ConvergenceConfig::default());

        let result = loop_runner.run(vec![Artifact::new("a.rs", "fn main() {}", "t1")], CancellationToken::new()).await;
        assert_eq!(result.status, ConvergenceStatus::Escalated);
        assert_eq!(result.escalation_reason, Some(EscalationReason::Stuck));
    }

    #[tokio::test]
    async fn max_iterations_reached_without_stuck_pattern_still_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let gates: Vec<Box<dyn Gate>> =
            vec![crate::gate::lint_gate(dir.path().to_path_buf(), "exit 1")];
        let providers = ProviderRegistry::new();
        providers.register(Arc::new(MockProvider::new("mock", "not json")), true).await;
        let tools = ToolRegistry::for_workspace(dir.path().to_path_buf(), new_hook_registry());
        let mut config = ConvergenceConfig::default();
        config.max_iterations = 1;
        config.escalate_after_same_error = 100;
        let loop_runner = ConvergenceLoop::new(gates, providers, tools, config);

        let result = loop_runner.run(vec![Artifact::new("a.rs", "fn main() {}", "t1")], CancellationToken::new()).await;
        assert_eq!(result.status, ConvergenceStatus::Escalated);
        assert_eq!(result.escalation_reason, None);
    }
}
