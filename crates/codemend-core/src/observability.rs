//! Observability: tracing init and the JSONL audit log.
//!
//! Reads `ObservabilityConfig` for CODEMEND_QUIET, CODEMEND_LOG_LEVEL,
//! CODEMEND_LOG_JSON and CODEMEND_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` wins when set; otherwise CODEMEND_LOG_LEVEL, or WARN-only in quiet mode.
/// Logs go to stderr so script output on stdout stays clean.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "codemend=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn audit_path() -> Option<&'static Path> {
    static AUDIT_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
    AUDIT_PATH
        .get_or_init(|| {
            let path = PathBuf::from(ObservabilityConfig::from_env().audit_log.clone()?);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Some(path)
        })
        .as_deref()
}

fn append_jsonl(path: &Path, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: one package install finished (success or failure)
pub fn audit_dependency_install(module: &str, success: bool, duration_ms: u64) {
    if let Some(path) = audit_path() {
        let record = json!({
            "ts": now(),
            "event": "dependency_install",
            "module": module,
            "success": success,
            "duration_ms": duration_ms,
        });
        append_jsonl(path, &record);
    }
}

/// Audit: execution_started (right before spawn)
pub fn audit_execution_started(interpreter: &str, script: &str, cwd: &str) {
    if let Some(path) = audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_started",
            "interpreter": interpreter,
            "script": script,
            "cwd": cwd,
        });
        append_jsonl(path, &record);
    }
}

/// Audit: execution_completed
pub fn audit_execution_completed(
    exit_code: i32,
    duration_ms: u64,
    stdout_len: usize,
    killed_reason: Option<&str>,
) {
    if let Some(path) = audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_completed",
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "stdout_len": stdout_len,
            "success": exit_code == 0 && killed_reason.is_none(),
            "killed_reason": killed_reason,
        });
        append_jsonl(path, &record);
    }
}
