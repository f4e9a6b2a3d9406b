//! Typed errors for staging, provisioning and execution.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single package install failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallFailure {
    /// Installer exited non-zero (code, or -1 when killed by a signal)
    ExitStatus(i32),
    /// Installer exceeded its per-package budget
    Timeout(u64),
    /// Installer could not be started
    Launch,
}

impl std::fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitStatus(code) => write!(f, "installer exited with code {}", code),
            Self::Timeout(secs) => write!(f, "installer timed out after {}s", secs),
            Self::Launch => write!(f, "installer could not be started"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Runtime root missing or lacking an interpreter. Fatal, never retried.
    #[error("runtime not found: {} ({reason})", path.display())]
    RuntimeNotFound { path: PathBuf, reason: String },

    #[error("dependency installation failed for '{module}': {failure}: {detail}")]
    DependencyInstall {
        module: String,
        failure: InstallFailure,
        detail: String,
    },

    #[error("failed to stage script: {0}")]
    Staging(#[source] std::io::Error),

    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("execution cancelled")]
    Cancelled,
}
