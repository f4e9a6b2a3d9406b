//! Subcommand implementations. Each returns the process exit code.

pub mod deps;
pub mod exec;
pub mod generate;
pub mod interactive;
pub mod serve;

use anyhow::{Context, Result};
use codemend_core::config::{EngineConfig, PathsConfig};
use codemend_core::Repairer;
use codemend_executor::retry::NoRepair;
use codemend_executor::{
    warn_on_err, AttemptObserver, NoopObserver, RetryError, RetryOrchestrator, RetryOutcome,
    SessionLog,
};
use codemend_sandbox::{CancelToken, ExecutionLimits, Executor};

/// Exit code when the user interrupts with Ctrl+C
pub const EXIT_CANCELLED: i32 = 130;
/// Exit code for usage / configuration problems
pub const EXIT_CONFIG: i32 = 2;

const RULE: &str = "------------------------------------------------------------";

pub(crate) fn engine_config(
    runtime: Option<std::path::PathBuf>,
    timeout: Option<u64>,
    max_retries: Option<u32>,
) -> EngineConfig {
    EngineConfig::from_env().with_cli_overrides(runtime, timeout, max_retries)
}

/// Open a session log under the configured logs dir. Diagnostics only:
/// failure to create it is logged and the run continues without one.
pub(crate) fn open_session(request: &str) -> Option<SessionLog> {
    let paths = PathsConfig::from_env();
    match SessionLog::create(&paths.logs_dir, request) {
        Ok(log) => {
            tracing::info!(dir = %log.dir().display(), "Session log");
            Some(log)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not create session log, continuing without one");
            None
        }
    }
}

pub(crate) fn open_executor(cfg: &EngineConfig) -> Result<Executor> {
    Executor::new(&cfg.runtime_dir, ExecutionLimits::from(cfg)).with_context(|| {
        format!(
            "Isolated runtime unavailable (create one with `python -m venv {}`)",
            cfg.runtime_dir.display()
        )
    })
}

/// Run the repair loop; `Ok(None)` when the user cancelled.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_with_repair(
    executor: &mut Executor,
    repairer: Option<&dyn Repairer>,
    max_retries: u32,
    install_deps: bool,
    request: &str,
    code: &str,
    session: Option<&mut SessionLog>,
    cancel: &CancelToken,
) -> Result<Option<RetryOutcome>> {
    let repairer: &dyn Repairer = repairer.unwrap_or(&NoRepair);
    let mut noop = NoopObserver;
    let observer: &mut dyn AttemptObserver = match session {
        Some(log) => log,
        None => &mut noop,
    };

    let outcome = RetryOrchestrator::new(executor, repairer, max_retries)
        .install_deps(install_deps)
        .run(request, code, observer, cancel);

    match outcome {
        Ok(o) => Ok(Some(o)),
        Err(RetryError::Cancelled) => Ok(None),
        Err(RetryError::Sandbox(e)) => Err(e).context("Execution engine failed"),
    }
}

pub(crate) fn print_outcome(outcome: &RetryOutcome, max_retries: u32) {
    let result = &outcome.result;
    println!("{}", RULE);
    if result.success {
        println!("Execution succeeded");
    } else {
        println!("Execution failed (exit code {})", result.exit_code);
    }
    if !result.output.is_empty() {
        println!("\nOutput:\n{}", result.output.trim_end());
    }
    if !result.error.is_empty() {
        eprintln!("\nError:\n{}", result.error.trim_end());
    }
    println!(
        "\nTime: {:.2}s    Attempts: {}/{}",
        result.execution_time_secs,
        outcome.attempts,
        max_retries + 1
    );
    if let Some(e) = &outcome.repair_error {
        eprintln!("Repair stopped early: {}", e);
    }
}

pub(crate) fn finish_session(session: Option<&SessionLog>, outcome: Option<&RetryOutcome>) {
    let Some(log) = session else { return };
    let summary = match outcome {
        Some(o) if o.result.success => format!("succeeded after {} attempt(s)", o.attempts),
        Some(o) => format!("failed after {} attempt(s)", o.attempts),
        None => "cancelled".to_string(),
    };
    warn_on_err("finish", log.finish(Some(&summary)));
}

pub(crate) fn exit_code(outcome: &RetryOutcome) -> i32 {
    if outcome.result.success {
        0
    } else {
        1
    }
}

pub(crate) fn print_rule() {
    println!("{}", RULE);
}
