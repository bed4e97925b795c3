//! Command surface: one `clap` subcommand per spec.md §6.3 entry.
//! Parsing lives here; `main.rs` wires the parsed command to the
//! engine crates and maps the result to an exit code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sunwell_types::TrustLevel;

#[derive(Parser, Debug)]
#[command(name = "sunwell")]
#[command(about = "Agent-orchestration execution core: orient, plan, execute, validate, learn")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a goal to completion (or escalation/timeout).
    Run {
        goal: String,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
        #[arg(long)]
        converge: bool,
        #[arg(long)]
        no_converge: bool,
        #[arg(long, value_delimiter = ',')]
        converge_gates: Vec<String>,
        #[arg(long)]
        converge_max: Option<u32>,
        #[arg(long, value_enum)]
        trust: Option<TrustArg>,
        #[arg(long)]
        time: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Resume the most recent checkpoint for a goal.
    Resume {
        #[arg(long)]
        goal: String,
        #[arg(long)]
        phase: Option<String>,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    /// Run with prefetch+memory, checkpointing, guardrails, and
    /// specialist spawning all enabled — the "all four pillars" mode.
    Autonomous {
        goal: String,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
        #[arg(long)]
        time: Option<u64>,
    },
    /// Diagnostics bundle, secrets redacted, capped at 5 MB.
    Debug {
        #[command(subcommand)]
        action: DebugCommand,
    },
    /// Plan version history for a goal.
    Plan {
        #[command(subcommand)]
        action: PlanCommand,
    },
    /// Adaptive guardrail log: violations, proposed evolutions, rollback.
    Guardrails {
        #[command(subcommand)]
        action: GuardrailsCommand,
    },
    /// Session summaries.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum DebugCommand {
    Dump {
        #[arg(short = 'o', long, default_value = "sunwell-debug.tar.gz")]
        output: PathBuf,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    History {
        goal_hash: Option<String>,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    Diff {
        from: String,
        to: String,
        #[arg(long)]
        goal_hash: String,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    Show {
        version: String,
        #[arg(long)]
        goal_hash: String,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum GuardrailsCommand {
    Check {
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    Show {
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    History {
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    Rollback {
        session_id: String,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
    RollbackGoal {
        goal_id: String,
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    Summary {
        #[arg(long, env = "SUNWELL_WORKSPACE", default_value = ".")]
        workspace: PathBuf,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum TrustArg {
    Conservative,
    Guarded,
    Supervised,
    Full,
}

impl From<TrustArg> for TrustLevel {
    fn from(value: TrustArg) -> Self {
        match value {
            TrustArg::Conservative => TrustLevel::Conservative,
            TrustArg::Guarded => TrustLevel::Guarded,
            TrustArg::Supervised => TrustLevel::Supervised,
            TrustArg::Full => TrustLevel::Full,
        }
    }
}
