//! Structured logging: JSON file layer with daily rotation and
//! retention pruning, plus a compact console layer. Every engine emits
//! through `tracing`; this crate only owns the subscriber wiring and
//! the redaction helper used when a log line would otherwise carry raw
//! user or model text.

pub mod event_bus;

pub use event_bus::EventBus;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize)]
pub struct LoggingInitInfo {
    pub logs_dir: String,
    pub prefix: String,
    pub retention_days: u64,
    pub initialized_at: DateTime<Utc>,
}

/// One structured log line. Mirrors the run/specialist correlation
/// keys carried on `sunwell_types::Event` so log lines and the event
/// stream can be joined by `run_id` alone.
#[derive(Debug, Clone, Serialize)]
pub struct ObservabilityEvent<'a> {
    pub event: &'a str,
    pub component: &'a str,
    pub run_id: Option<&'a str>,
    pub specialist_id: Option<&'a str>,
    pub task_id: Option<&'a str>,
    pub gate_name: Option<&'a str>,
    pub provider_id: Option<&'a str>,
    pub model_id: Option<&'a str>,
    pub status: Option<&'a str>,
    pub error_code: Option<&'a str>,
    pub detail: Option<&'a str>,
}

pub fn redact_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!(
        "[redacted len={} sha256={}]",
        trimmed.len(),
        short_hash(trimmed)
    )
}

pub fn short_hash(input: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub fn emit_event(level: Level, event: ObservabilityEvent<'_>) {
    match level {
        Level::ERROR => tracing::error!(
            target: "sunwell.obs",
            component = event.component,
            event = event.event,
            run_id = event.run_id.unwrap_or(""),
            specialist_id = event.specialist_id.unwrap_or(""),
            task_id = event.task_id.unwrap_or(""),
            gate_name = event.gate_name.unwrap_or(""),
            provider_id = event.provider_id.unwrap_or(""),
            model_id = event.model_id.unwrap_or(""),
            status = event.status.unwrap_or(""),
            error_code = event.error_code.unwrap_or(""),
            detail = event.detail.unwrap_or(""),
            "observability_event"
        ),
        Level::WARN => tracing::warn!(
            target: "sunwell.obs",
            component = event.component,
            event = event.event,
            run_id = event.run_id.unwrap_or(""),
            specialist_id = event.specialist_id.unwrap_or(""),
            task_id = event.task_id.unwrap_or(""),
            gate_name = event.gate_name.unwrap_or(""),
            provider_id = event.provider_id.unwrap_or(""),
            model_id = event.model_id.unwrap_or(""),
            status = event.status.unwrap_or(""),
            error_code = event.error_code.unwrap_or(""),
            detail = event.detail.unwrap_or(""),
            "observability_event"
        ),
        _ => tracing::info!(
            target: "sunwell.obs",
            component = event.component,
            event = event.event,
            run_id = event.run_id.unwrap_or(""),
            specialist_id = event.specialist_id.unwrap_or(""),
            task_id = event.task_id.unwrap_or(""),
            gate_name = event.gate_name.unwrap_or(""),
            provider_id = event.provider_id.unwrap_or(""),
            model_id = event.model_id.unwrap_or(""),
            status = event.status.unwrap_or(""),
            error_code = event.error_code.unwrap_or(""),
            detail = event.detail.unwrap_or(""),
            "observability_event"
        ),
    }
}

/// Installs the global subscriber: compact ANSI on stderr, JSON lines
/// rotated daily under `logs_dir`. Returns the `WorkerGuard` the caller
/// must keep alive for the lifetime of the process, or log writes get
/// dropped on shutdown.
pub fn init_logging(logs_dir: &Path, retention_days: u64) -> anyhow::Result<(WorkerGuard, LoggingInitInfo)> {
    fs::create_dir_all(logs_dir)?;
    cleanup_old_jsonl(logs_dir, retention_days)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("sunwell")
        .filename_suffix("jsonl")
        .build(logs_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_current_span(false)
        .with_span_list(false);

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_ansi(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    let info = LoggingInitInfo {
        logs_dir: logs_dir.display().to_string(),
        prefix: "sunwell".to_string(),
        retention_days,
        initialized_at: Utc::now(),
    };

    Ok((guard, info))
}

fn cleanup_old_jsonl(logs_dir: &Path, retention_days: u64) -> anyhow::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let prefix = "sunwell.";

    for entry in fs::read_dir(logs_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if !name.starts_with(prefix) || !name.ends_with(".jsonl") {
            continue;
        }

        // expected: sunwell.YYYY-MM-DD.jsonl
        let date_part = name.trim_start_matches(prefix).trim_end_matches(".jsonl");

        let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
            continue;
        };

        let Some(dt) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };

        if DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc) < cutoff {
            let _ = fs::remove_file(path);
        }
    }

    Ok(())
}

pub fn canonical_logs_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".sunwell").join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_text_masks_content() {
        let raw = "super-secret-token-123";
        let redacted = redact_text(raw);
        assert!(redacted.contains("[redacted len="));
        assert!(!redacted.contains("super-secret-token-123"));
    }

    #[test]
    fn canonical_logs_dir_joins_dot_sunwell() {
        let root = PathBuf::from("/tmp/project");
        let logs = canonical_logs_dir(&root);
        assert_eq!(logs, PathBuf::from("/tmp/project/.sunwell/logs"));
    }

    #[test]
    fn cleanup_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let old_name = dir.path().join("sunwell.2000-01-01.jsonl");
        let fresh_name = dir.path().join(format!("sunwell.{}.jsonl", Utc::now().format("%Y-%m-%d")));
        fs::write(&old_name, "{}").unwrap();
        fs::write(&fresh_name, "{}").unwrap();

        cleanup_old_jsonl(dir.path(), 30).unwrap();

        assert!(!old_name.exists());
        assert!(fresh_name.exists());
    }
}
