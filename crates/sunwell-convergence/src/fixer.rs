use serde::Deserialize;
use sunwell_providers::{ChatMessage, ProviderRegistry};
use sunwell_types::Artifact;

use crate::gate::GateResult;

#[derive(Debug, Deserialize)]
struct FileFix {
    path: String,
    content: String,
}

fn build_prompt(failing: &[GateResult], artifacts: &[Artifact]) -> String {
    let mut lines = vec![
        "The following validation gates failed. Propose fixes as a JSON array of \
         {path, content} objects giving the full corrected content for each file \
         that needs to change."
            .to_string(),
    ];

    for result in failing {
        lines.push(format!("## {} gate failed", result.gate.as_str()));
        for error in &result.errors {
            lines.push(format!("- {error}"));
        }
    }

    lines.push("## Current file contents".to_string());
    for artifact in artifacts {
        lines.push(format!("### {}\n{}", artifact.path, artifact.content));
    }

    lines.join("\n")
}

/// One fixer call result: the proposed content per path, plus tokens the
/// call consumed (charged against the loop's token budget regardless of
/// whether the fix ends up applied).
pub struct FixProposal {
    pub files: Vec<(String, String)>,
    pub tokens_used: u64,
}

/// Asks the model to propose a fix for the current set of failing gates.
/// A provider error or unparseable response yields an empty proposal so
/// the loop can still account for tokens and continue iterating.
pub async fn propose_fix(
    providers: &ProviderRegistry,
    failing: &[GateResult],
    artifacts: &[Artifact],
) -> FixProposal {
    let prompt = build_prompt(failing, artifacts);
    let messages = vec![ChatMessage { role: "user".to_string(), content: prompt }];

    match providers.complete(None, &messages, None).await {
        Ok(completion) => {
            let files = serde_json::from_str::<Vec<FileFix>>(&completion.text)
                .map(|fixes| fixes.into_iter().map(|f| (f.path, f.content)).collect())
                .unwrap_or_default();
            FixProposal { files, tokens_used: completion.usage.total_tokens }
        }
        Err(err) => {
            tracing::warn!(error = %err, "convergence fixer call failed");
            FixProposal { files: Vec::new(), tokens_used: 0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateKind;
    use std::sync::Arc;
    use sunwell_providers::MockProvider;

    #[tokio::test]
    async fn parses_file_fixes_from_a_well_formed_response() {
        let registry = ProviderRegistry::new();
        registry
            .register(
                Arc::new(MockProvider::new("mock", r#"[{"path":"src/lib.rs","content":"fn main() {}"}]"#)),
                true,
            )
            .await;

        let failing = vec![crate::gate::GateResult {
            gate: GateKind::Lint,
            passed: false,
            errors: vec!["unused import".to_string()],
            duration_ms: 1,
        }];
        let proposal = propose_fix(&registry, &failing, &[]).await;
        assert_eq!(proposal.files, vec![("src/lib.rs".to_string(), "fn main() {}".to_string())]);
    }

    #[tokio::test]
    async fn unparseable_response_yields_no_files() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("mock", "not json")), true).await;
        let proposal = propose_fix(&registry, &[], &[]).await;
        assert!(proposal.files.is_empty());
    }
}
