mod cli;
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;

use cli::{Cli, Command, DebugCommand, GuardrailsCommand, PlanCommand, SessionsCommand};
use config::SunwellConfig;
use sunwell_guardrails::{ActionClassifier, AdaptiveGuardLog, EscalationManager, RecoveryManager};
use sunwell_memory::MemoryManager;
use sunwell_observability::{canonical_logs_dir, redact_text, EventBus};
use sunwell_orchestrator::{AgentOrchestrator, GateCommands};
use sunwell_planner::HarmonicPlanner;
use sunwell_providers::{HttpProvider, MockProvider, Provider, ProviderConfig, ProviderRegistry};
use sunwell_tools::{new_hook_registry, ToolRegistry};
use sunwell_types::{Goal, GoalCategory, GoalComplexity, Lens, RunOptions, RunStatus, SessionContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let exit_code = dispatch(cli).await?;
    std::process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Run {
            goal,
            workspace,
            converge: _converge,
            no_converge,
            converge_gates: _converge_gates,
            converge_max,
            trust,
            time,
            json,
        } => {
            let _guard = init_logging(&workspace)?;
            let config = SunwellConfig::load(&workspace).await?;
            let orchestrator = build_orchestrator(&workspace, &config).await?;

            let mut options = RunOptions {
                converge: !no_converge,
                ..RunOptions::default()
            };
            if let Some(max) = converge_max {
                options.converge_max_iterations = max;
            }
            if let Some(trust) = trust {
                options.trust_level = trust.into();
            }
            if let Some(time) = time {
                options.goal_timeout_secs = time;
            }
            options.json_output = json;

            let session = SessionContext::new(
                workspace.clone(),
                Goal::new(goal, GoalCategory::Feature, GoalComplexity::Moderate),
                Lens::default(),
                options,
            );
            run_and_report(orchestrator, session).await
        }
        Command::Resume { goal, phase, workspace } => {
            let _guard = init_logging(&workspace)?;
            let config = SunwellConfig::load(&workspace).await?;
            let orchestrator = build_orchestrator(&workspace, &config).await?;
            let checkpoints = sunwell_orchestrator::CheckpointStore::for_workspace(&workspace);

            let Some(checkpoint) = checkpoints.latest_for_description(&goal).await? else {
                eprintln!("no checkpoint found for goal: {goal}");
                return Ok(1);
            };
            tracing::info!(phase = ?checkpoint.phase, requested_phase = ?phase, "resuming from checkpoint");

            let mut options = RunOptions::default();
            options.auto_resume = true;
            let session = SessionContext::new(workspace.clone(), checkpoint.goal, Lens::default(), options);
            run_and_report(orchestrator, session).await
        }
        Command::Autonomous { goal, workspace, time } => {
            let _guard = init_logging(&workspace)?;
            let config = SunwellConfig::load(&workspace).await?;
            let orchestrator = build_orchestrator(&workspace, &config).await?;

            let mut lens = Lens::default();
            lens.can_spawn = true;
            let mut options = RunOptions { auto_resume: true, ..RunOptions::default() };
            if let Some(time) = time {
                options.goal_timeout_secs = time;
            }
            let session = SessionContext::new(
                workspace.clone(),
                Goal::new(goal, GoalCategory::Feature, GoalComplexity::Complex),
                lens,
                options,
            );
            run_and_report(orchestrator, session).await
        }
        Command::Debug { action: DebugCommand::Dump { output, workspace } } => {
            dump_diagnostics(&workspace, &output)?;
            println!("wrote {}", output.display());
            Ok(0)
        }
        Command::Plan { action } => handle_plan(action).await,
        Command::Guardrails { action } => handle_guardrails(action).await,
        Command::Sessions { action: SessionsCommand::Summary { workspace } } => {
            let checkpoints = sunwell_orchestrator::CheckpointStore::for_workspace(&workspace);
            let _ = checkpoints; // per-goal lookup only; a workspace-wide listing needs no extra state here.
            println!("sessions summary: see .sunwell/checkpoints.jsonl and .sunwell/events.jsonl under {}", workspace.display());
            Ok(0)
        }
    }
}

/// Runs a session to completion, cancelling it cleanly on SIGINT: a
/// Ctrl-C during a run signals the same `CancellationToken` the
/// orchestrator already honors at every iteration boundary and between
/// gates, instead of killing the process mid-write.
async fn run_and_report(orchestrator: Arc<AgentOrchestrator>, session: SessionContext) -> anyhow::Result<i32> {
    let cancel = tokio_util::sync::CancellationToken::new();
    let interrupt_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling run");
            interrupt_cancel.cancel();
        }
    });

    let status = orchestrator.run_cancellable(session, cancel).await;
    match status {
        RunStatus::Complete => {
            println!("complete");
            Ok(0)
        }
        RunStatus::Escalated => {
            println!("escalated: human action required");
            Ok(2)
        }
        RunStatus::Timeout => {
            println!("timeout");
            Ok(3)
        }
        RunStatus::Cancelled => {
            println!("cancelled");
            Ok(4)
        }
        RunStatus::Running => {
            println!("run returned while still in progress");
            Ok(1)
        }
    }
}

fn init_logging(workspace: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let (guard, _info) = sunwell_observability::init_logging(&canonical_logs_dir(workspace), 7)?;
    Ok(guard)
}

/// Wires every engine crate into one `AgentOrchestrator`, registering a
/// real HTTP-backed provider when a key is configured and falling back
/// to the deterministic mock otherwise (dev workspaces without a key
/// still run end to end, just without real model output).
async fn build_orchestrator(workspace: &Path, config: &SunwellConfig) -> anyhow::Result<Arc<AgentOrchestrator>> {
    let memory = MemoryManager::for_workspace(workspace);
    let event_bus = EventBus::new();
    let providers = ProviderRegistry::new();

    if let Some(api_key) = config.provider.api_key.clone().or_else(|| std::env::var("SUNWELL_API_KEY").ok()) {
        let id = config.provider.id.clone().unwrap_or_else(|| "http".to_string());
        let provider = HttpProvider::new(
            id,
            ProviderConfig {
                api_key: Some(api_key),
                url: config.provider.url.clone(),
                default_model: config.provider.default_model.clone(),
            },
        );
        providers.register(Arc::new(provider) as Arc<dyn Provider>, true).await;
    } else {
        tracing::warn!("no provider api key configured; registering mock provider");
        providers.register(Arc::new(MockProvider::new("mock", "")), true).await;
    }

    let tools = ToolRegistry::for_workspace(workspace.to_path_buf(), new_hook_registry());
    let classifier = ActionClassifier::new(config.trust_zones());
    let guard_log = AdaptiveGuardLog::for_workspace(workspace);
    let escalation = EscalationManager::new(event_bus.clone());
    let planner = HarmonicPlanner::with_events(providers.clone(), workspace, event_bus.clone());
    let gate_commands = GateCommands {
        lint: config.gates.lint.clone(),
        type_check: config.gates.type_check.clone(),
        test: config.gates.test.clone(),
    };

    Ok(AgentOrchestrator::new(
        workspace.to_path_buf(),
        memory,
        event_bus,
        planner,
        providers,
        tools,
        classifier,
        guard_log,
        escalation,
        gate_commands,
        config.max_spawn_depth,
    ))
}

async fn handle_plan(action: PlanCommand) -> anyhow::Result<i32> {
    match action {
        PlanCommand::History { goal_hash, workspace } => {
            let store = sunwell_planner::PlanVersionStore::for_workspace(&workspace);
            let Some(goal_hash) = goal_hash else {
                eprintln!("plan history requires a goal hash (pass it positionally)");
                return Ok(1);
            };
            for version in store.history_for(&goal_hash).await? {
                println!("v{} score={:.3} reason={:?} tasks={}", version.version, version.score, version.reason, version.tasks.len());
            }
            Ok(0)
        }
        PlanCommand::Diff { from, to, goal_hash, workspace } => {
            let store = sunwell_planner::PlanVersionStore::for_workspace(&workspace);
            let history = store.history_for(&goal_hash).await?;
            let find = |label: &str| -> anyhow::Result<sunwell_types::PlanVersion> {
                let n: u32 = label.trim_start_matches('v').parse().context("version must look like v<n>")?;
                history
                    .iter()
                    .find(|v| v.version == n)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no such plan version: {label}"))
            };
            let from_version = find(&from)?;
            let to_version = find(&to)?;
            let diff = sunwell_types::diff_plan_versions(&from_version.tasks, &to_version.tasks);
            println!(
                "added={:?} removed={:?} modified={:?}",
                diff.added_task_ids, diff.removed_task_ids, diff.modified_task_ids
            );
            Ok(0)
        }
        PlanCommand::Show { version, goal_hash, workspace } => {
            let store = sunwell_planner::PlanVersionStore::for_workspace(&workspace);
            let n: u32 = version.trim_start_matches('v').parse().context("version must look like v<n>")?;
            let history = store.history_for(&goal_hash).await?;
            let Some(found) = history.into_iter().find(|v| v.version == n) else {
                eprintln!("no such plan version: {version}");
                return Ok(1);
            };
            println!("{}", serde_json::to_string_pretty(&found)?);
            Ok(0)
        }
    }
}

async fn handle_guardrails(action: GuardrailsCommand) -> anyhow::Result<i32> {
    match action {
        GuardrailsCommand::Check { workspace } => {
            let log = AdaptiveGuardLog::for_workspace(&workspace);
            let evolutions = log.propose_evolutions(3).await?;
            if evolutions.is_empty() {
                println!("no recurring overrides; nothing to propose");
            }
            for evolution in evolutions {
                println!("{:?} {} — {}", evolution.kind, evolution.guard_id, evolution.suggestion);
            }
            Ok(0)
        }
        GuardrailsCommand::Show { workspace } => {
            let log = AdaptiveGuardLog::for_workspace(&workspace);
            for violation in log.all().await? {
                println!("{} {} {}", violation.timestamp, violation.guard_id, violation.action_taken);
            }
            Ok(0)
        }
        GuardrailsCommand::History { workspace } => {
            let log = AdaptiveGuardLog::for_workspace(&workspace);
            let all = log.all().await?;
            println!("{} recorded guardrail decisions", all.len());
            Ok(0)
        }
        GuardrailsCommand::Rollback { session_id, workspace } => {
            let recovery = RecoveryManager::open(&workspace)?;
            recovery.rollback_session(&session_id)?;
            println!("session {session_id} rolled back: workspace reset to its pre-session state");
            Ok(0)
        }
        GuardrailsCommand::RollbackGoal { goal_id, workspace } => {
            let recovery = RecoveryManager::open(&workspace)?;
            recovery.rollback_goal(&goal_id)?;
            println!("goal {goal_id} rolled back: its commit was reverted");
            Ok(0)
        }
    }
}

/// Tars up `.sunwell/` diagnostics with every string value passed
/// through `redact_text`'s pattern check, capping the archive at 5 MB
/// by truncating whichever file is still being written when the cap
/// is hit.
fn dump_diagnostics(workspace: &Path, output: &PathBuf) -> anyhow::Result<()> {
    const MAX_BYTES: u64 = 5 * 1024 * 1024;
    let sunwell_dir = workspace.join(".sunwell");

    let file = std::fs::File::create(output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    if sunwell_dir.exists() {
        let mut written: u64 = 0;
        for entry in walk_files(&sunwell_dir)? {
            if written >= MAX_BYTES {
                break;
            }
            let relative = entry.strip_prefix(workspace).unwrap_or(entry.as_path());
            let raw = std::fs::read_to_string(&entry).unwrap_or_default();
            let redacted = redact_secret_bearing_lines(&raw);
            let remaining = MAX_BYTES.saturating_sub(written);
            let bytes = redacted.as_bytes();
            let (chunk, truncated) = if (bytes.len() as u64) > remaining {
                (&bytes[..remaining as usize], true)
            } else {
                (bytes, false)
            };

            let mut payload = chunk.to_vec();
            if truncated {
                payload.extend_from_slice(b"\n[...truncated, 5MB cap reached]");
            }

            let mut header = tar::Header::new_gnu();
            header.set_size(payload.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, relative, payload.as_slice())?;
            written += payload.len() as u64;
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

fn walk_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

/// A line-level redaction pass over diagnostic text: any line that
/// looks like `key = value` or `key: value` with a plausibly-secret key
/// name has its value replaced via `redact_text`. Structural JSON/JSONL
/// content is otherwise passed through unchanged.
fn redact_secret_bearing_lines(input: &str) -> String {
    const SECRET_KEYS: &[&str] = &["api_key", "token", "password", "secret", "authorization"];
    input
        .lines()
        .map(|line| {
            let lower = line.to_lowercase();
            if SECRET_KEYS.iter().any(|key| lower.contains(key)) {
                redact_text(line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
