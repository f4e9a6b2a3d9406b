use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use codemend_core::config::EngineConfig;
use codemend_core::observability;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::common::{isolate_process_group, wait_with_timeout, KillReason};
use crate::deps::extract_imports;
use crate::env::{Provisioner, RuntimePaths};
use crate::error::{Error, Result};
use crate::staging::{StagedScript, StagingArea};

/// Outcome of one execution attempt. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Captured stdout
    pub output: String,
    /// Captured stderr, or an engine diagnostic when the script never ran to completion
    pub error: String,
    pub exit_code: i32,
    pub execution_time_secs: f64,
}

impl ExecutionResult {
    /// Failure that did not come from the script's own exit status.
    pub fn engine_failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
            exit_code: -1,
            execution_time_secs: elapsed.as_secs_f64(),
        }
    }

    fn from_exit(stdout: String, stderr: String, exit_code: i32, elapsed: Duration) -> Self {
        Self {
            success: exit_code == 0,
            output: stdout,
            error: stderr,
            exit_code,
            execution_time_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Time budgets for execution and package installation
///
/// Defaults: 60 s per script execution, 300 s per package install.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub exec_timeout_secs: u64,
    pub install_timeout_secs: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            exec_timeout_secs: crate::common::DEFAULT_EXEC_TIMEOUT_SECS,
            install_timeout_secs: crate::common::DEFAULT_INSTALL_TIMEOUT_SECS,
        }
    }
}

impl From<&EngineConfig> for ExecutionLimits {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            exec_timeout_secs: cfg.exec_timeout_secs,
            install_timeout_secs: cfg.install_timeout_secs,
        }
    }
}

/// Runs scripts in an isolated runtime, one child process per call.
///
/// Owns the staging area and the provisioner; both live as long as the
/// executor, and the staging directory is removed after every run.
#[derive(Debug)]
pub struct Executor {
    provisioner: Provisioner,
    staging: StagingArea,
    limits: ExecutionLimits,
}

impl Executor {
    /// Fails with `RuntimeNotFound` if `runtime_root` is not a usable runtime.
    pub fn new(runtime_root: &Path, limits: ExecutionLimits) -> Result<Self> {
        let runtime = RuntimePaths::resolve(runtime_root)?;
        tracing::debug!(
            root = %runtime.root.display(),
            python = %runtime.python.display(),
            "Resolved isolated runtime"
        );
        Ok(Self {
            provisioner: Provisioner::new(
                runtime,
                Duration::from_secs(limits.install_timeout_secs),
            ),
            staging: StagingArea::new(),
            limits,
        })
    }

    pub fn runtime(&self) -> &RuntimePaths {
        self.provisioner.runtime()
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Stage `source`, optionally install its imports, and run it.
    ///
    /// Every failure except cancellation is reported inside the returned
    /// `ExecutionResult`. The staging directory is gone when this returns.
    pub fn run(
        &mut self,
        source: &str,
        install_deps: bool,
        cancel: &CancelToken,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Self {
            provisioner,
            staging,
            limits,
        } = self;

        let staged = match staging.stage(source) {
            Ok(s) => s,
            Err(e) => {
                return Ok(ExecutionResult::engine_failure(
                    format!("execution error: {}", e),
                    start.elapsed(),
                ))
            }
        };

        if install_deps {
            let modules = extract_imports(source);
            if !modules.is_empty() {
                crate::info_log!(modules = ?modules, "Detected third-party imports");
                match provisioner.ensure_available(&modules, cancel) {
                    Ok(()) => {}
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        return Ok(ExecutionResult::engine_failure(
                            e.to_string(),
                            start.elapsed(),
                        ))
                    }
                }
            }
        }

        execute_staged(
            provisioner.runtime(),
            &staged,
            Duration::from_secs(limits.exec_timeout_secs),
            cancel,
            start,
        )
    }
}

fn execute_staged(
    runtime: &RuntimePaths,
    staged: &StagedScript<'_>,
    timeout: Duration,
    cancel: &CancelToken,
    start: Instant,
) -> Result<ExecutionResult> {
    let mut cmd = Command::new(&runtime.python);
    cmd.arg(staged.path())
        .current_dir(staged.dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("PYTHONUNBUFFERED", "1");
    isolate_process_group(&mut cmd);

    observability::audit_execution_started(
        &runtime.python.to_string_lossy(),
        &staged.path().to_string_lossy(),
        &staged.dir().to_string_lossy(),
    );

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(source) => {
            let e = Error::Spawn {
                program: runtime.python.clone(),
                source,
            };
            tracing::warn!(error = %e, "Could not launch interpreter");
            return Ok(ExecutionResult::engine_failure(
                format!("execution error: {}", e),
                start.elapsed(),
            ));
        }
    };

    let outcome = match wait_with_timeout(&mut child, timeout, cancel) {
        Ok(o) => o,
        Err(e) => {
            return Ok(ExecutionResult::engine_failure(
                format!("execution error: {}", Error::Wait(e)),
                start.elapsed(),
            ))
        }
    };
    let elapsed = start.elapsed();

    observability::audit_execution_completed(
        outcome.exit_code,
        elapsed.as_millis() as u64,
        outcome.stdout.len(),
        outcome.killed.map(|k| k.as_str()),
    );

    match outcome.killed {
        Some(KillReason::Cancelled) => {
            crate::info_log!("Execution cancelled; discarding partial result");
            Err(Error::Cancelled)
        }
        Some(KillReason::Timeout) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Execution timed out");
            Ok(ExecutionResult::engine_failure(
                format!("execution timed out after {}s", timeout.as_secs()),
                elapsed,
            ))
        }
        None => {
            crate::info_log!(
                exit_code = outcome.exit_code,
                elapsed_ms = elapsed.as_millis() as u64,
                "Execution finished"
            );
            Ok(ExecutionResult::from_exit(
                outcome.stdout,
                outcome.stderr,
                outcome.exit_code,
                elapsed,
            ))
        }
    }
}
