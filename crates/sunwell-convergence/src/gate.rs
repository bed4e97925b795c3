use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Lint,
    Type,
    Test,
    Syntax,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::Lint => "lint",
            GateKind::Type => "type",
            GateKind::Test => "test",
            GateKind::Syntax => "syntax",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateResult {
    pub gate: GateKind,
    pub passed: bool,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[async_trait]
pub trait Gate: Send + Sync {
    fn kind(&self) -> GateKind;
    /// Runs the gate against `changed_files` (relative to the workspace
    /// root) and returns whether it passed plus any error lines.
    async fn run(&self, changed_files: &[String]) -> GateResult;
}

/// Runs a fixed shell command (never user-composed — configured once,
/// at gate-registration time) with a timeout, and reports non-zero exit
/// as failure with stderr split into lines.
struct ShellGate {
    kind: GateKind,
    workspace_root: PathBuf,
    command: String,
    timeout: Duration,
    /// When set, the gate only runs if at least one changed file matches
    /// this suffix/substring filter (used by the Test gate to skip runs
    /// when nothing under a test location changed).
    file_filter: Option<fn(&str) -> bool>,
}

#[async_trait]
impl Gate for ShellGate {
    fn kind(&self) -> GateKind {
        self.kind
    }

    async fn run(&self, changed_files: &[String]) -> GateResult {
        let start = std::time::Instant::now();

        if let Some(filter) = self.file_filter {
            if !changed_files.is_empty() && !changed_files.iter().any(|f| filter(f)) {
                return GateResult {
                    gate: self.kind,
                    passed: true,
                    errors: Vec::new(),
                    duration_ms: 0,
                };
            }
        }

        let run = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.workspace_root)
            .output();

        match timeout(self.timeout, run).await {
            Ok(Ok(output)) => {
                let passed = output.status.success();
                let errors = if passed {
                    Vec::new()
                } else {
                    String::from_utf8_lossy(&output.stderr)
                        .lines()
                        .map(|l| l.to_string())
                        .collect()
                };
                GateResult {
                    gate: self.kind,
                    passed,
                    errors,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
            Ok(Err(err)) => GateResult {
                gate: self.kind,
                passed: false,
                errors: vec![format!("gate command failed to start: {err}")],
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Err(_) => GateResult {
                gate: self.kind,
                passed: false,
                errors: vec![format!("{} gate timed out after {:?}", self.kind.as_str(), self.timeout)],
                duration_ms: start.elapsed().as_millis() as u64,
            },
        }
    }
}

fn is_test_path(path: &str) -> bool {
    path.contains("/tests/") || path.starts_with("tests/") || path.ends_with("_test.rs") || path.contains("/test_")
}

pub fn lint_gate(workspace_root: PathBuf, command: impl Into<String>) -> Box<dyn Gate> {
    Box::new(ShellGate {
        kind: GateKind::Lint,
        workspace_root,
        command: command.into(),
        timeout: Duration::from_secs(30),
        file_filter: None,
    })
}

pub fn type_gate(workspace_root: PathBuf, command: impl Into<String>) -> Box<dyn Gate> {
    Box::new(ShellGate {
        kind: GateKind::Type,
        workspace_root,
        command: command.into(),
        timeout: Duration::from_secs(60),
        file_filter: None,
    })
}

pub fn test_gate(workspace_root: PathBuf, command: impl Into<String>) -> Box<dyn Gate> {
    Box::new(ShellGate {
        kind: GateKind::Test,
        workspace_root,
        command: command.into(),
        timeout: Duration::from_secs(120),
        file_filter: Some(is_test_path),
    })
}

/// In-process syntax check: no subprocess, so no timeout needed. The
/// actual parser is supplied by the caller (language-specific); this
/// just wraps it in the `Gate` shape the loop expects.
pub struct SyntaxGate<F: Fn(&str) -> Result<(), String> + Send + Sync> {
    pub workspace_root: PathBuf,
    pub parse: F,
}

#[async_trait]
impl<F: Fn(&str) -> Result<(), String> + Send + Sync> Gate for SyntaxGate<F> {
    fn kind(&self) -> GateKind {
        GateKind::Syntax
    }

    async fn run(&self, changed_files: &[String]) -> GateResult {
        let start = std::time::Instant::now();
        let mut errors = Vec::new();
        for path in changed_files {
            let full = self.workspace_root.join(path);
            let Ok(content) = tokio::fs::read_to_string(&full).await else {
                continue;
            };
            if let Err(err) = (self.parse)(&content) {
                errors.push(format!("{path}: {err}"));
            }
        }
        GateResult {
            gate: GateKind::Syntax,
            passed: errors.is_empty(),
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lint_gate_reports_success_on_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let gate = lint_gate(dir.path().to_path_buf(), "true");
        let result = gate.run(&[]).await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn lint_gate_captures_stderr_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gate = lint_gate(dir.path().to_path_buf(), "echo boom 1>&2; exit 1");
        let result = gate.run(&[]).await;
        assert!(!result.passed);
        assert_eq!(result.errors, vec!["boom".to_string()]);
    }

    #[tokio::test]
    async fn test_gate_skips_when_no_changed_file_is_a_test() {
        let dir = tempfile::tempdir().unwrap();
        let gate = test_gate(dir.path().to_path_buf(), "exit 1");
        let result = gate.run(&["src/lib.rs".to_string()]).await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_gate_runs_when_a_changed_file_is_a_test() {
        let dir = tempfile::tempdir().unwrap();
        let gate = test_gate(dir.path().to_path_buf(), "exit 1");
        let result = gate.run(&["tests/foo.rs".to_string()]).await;
        assert!(!result.passed);
    }
}
