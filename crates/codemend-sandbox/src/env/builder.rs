//! Resolve RuntimePaths for a venv and install packages into it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use codemend_core::observability;

use crate::cancel::CancelToken;
use crate::common::{isolate_process_group, wait_with_timeout, KillReason};
use crate::error::{Error, InstallFailure, Result};

/// How packages get installed into the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installer {
    /// A standalone `pip` executable inside the runtime
    Pip(PathBuf),
    /// No pip binary; fall back to `<python> -m pip`
    PythonModule(PathBuf),
}

impl Installer {
    fn command(&self, module: &str) -> Command {
        let mut cmd = match self {
            Self::Pip(pip) => Command::new(pip),
            Self::PythonModule(python) => {
                let mut c = Command::new(python);
                c.arg("-m").arg("pip");
                c
            }
        };
        cmd.arg("install").arg(module);
        cmd
    }

    pub fn program(&self) -> &Path {
        match self {
            Self::Pip(p) | Self::PythonModule(p) => p,
        }
    }
}

/// Resolved executables of an isolated runtime.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Runtime root directory
    pub root: PathBuf,
    /// Interpreter (`bin/python` or `Scripts/python.exe`)
    pub python: PathBuf,
    pub installer: Installer,
}

impl RuntimePaths {
    /// Locate the interpreter and installer under `root`.
    ///
    /// Fails with `RuntimeNotFound` when the root or its interpreter is missing.
    pub fn resolve(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::RuntimeNotFound {
                path: root.to_path_buf(),
                reason: "directory does not exist".to_string(),
            });
        }

        let (python, pip) = if cfg!(windows) {
            (
                root.join("Scripts").join("python.exe"),
                root.join("Scripts").join("pip.exe"),
            )
        } else {
            (root.join("bin").join("python"), root.join("bin").join("pip"))
        };

        if !python.exists() {
            return Err(Error::RuntimeNotFound {
                path: root.to_path_buf(),
                reason: format!("no interpreter at {}", python.display()),
            });
        }

        let installer = if pip.exists() {
            Installer::Pip(pip)
        } else {
            Installer::PythonModule(python.clone())
        };

        Ok(Self {
            root: root.to_path_buf(),
            python,
            installer,
        })
    }
}

/// Installs third-party modules into a shared runtime.
///
/// Installs are additive and never rolled back. Modules installed
/// successfully by this provisioner are remembered and skipped on later calls.
#[derive(Debug)]
pub struct Provisioner {
    runtime: RuntimePaths,
    install_timeout: Duration,
    installed: BTreeSet<String>,
}

impl Provisioner {
    pub fn new(runtime: RuntimePaths, install_timeout: Duration) -> Self {
        Self {
            runtime,
            install_timeout,
            installed: BTreeSet::new(),
        }
    }

    pub fn runtime(&self) -> &RuntimePaths {
        &self.runtime
    }

    /// Modules this provisioner has installed so far
    pub fn installed(&self) -> &BTreeSet<String> {
        &self.installed
    }

    /// Make every module in `modules` available, installing in sorted order.
    ///
    /// The first failing module fails the whole call; modules installed before
    /// it stay installed.
    pub fn ensure_available(
        &mut self,
        modules: &BTreeSet<String>,
        cancel: &CancelToken,
    ) -> Result<()> {
        for module in modules {
            if self.installed.contains(module) {
                tracing::debug!(module = %module, "Already installed this session, skipping");
                continue;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.install_one(module, cancel)?;
            self.installed.insert(module.clone());
        }
        Ok(())
    }

    fn install_one(&self, module: &str, cancel: &CancelToken) -> Result<()> {
        crate::info_log!(module = %module, "Installing package");
        let start = Instant::now();

        let mut cmd = self.runtime.installer.command(module);
        cmd.current_dir(&self.runtime.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                observability::audit_dependency_install(module, false, 0);
                return Err(Error::DependencyInstall {
                    module: module.to_string(),
                    failure: InstallFailure::Launch,
                    detail: format!("{}: {}", self.runtime.installer.program().display(), e),
                });
            }
        };

        let outcome = wait_with_timeout(&mut child, self.install_timeout, cancel);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let failure = match outcome {
            Err(e) => Some((InstallFailure::Launch, e.to_string())),
            Ok(o) => match o.killed {
                Some(KillReason::Cancelled) => return Err(Error::Cancelled),
                Some(KillReason::Timeout) => Some((
                    InstallFailure::Timeout(self.install_timeout.as_secs()),
                    o.stderr,
                )),
                None if o.exit_code != 0 => {
                    Some((InstallFailure::ExitStatus(o.exit_code), o.stderr))
                }
                None => None,
            },
        };

        observability::audit_dependency_install(module, failure.is_none(), elapsed_ms);

        match failure {
            None => {
                crate::info_log!(module = %module, elapsed_ms, "Installed package");
                Ok(())
            }
            Some((failure, detail)) => {
                tracing::warn!(module = %module, %failure, "Package install failed");
                Err(Error::DependencyInstall {
                    module: module.to_string(),
                    failure,
                    detail: detail.trim().to_string(),
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::fake_runtime;

    fn modules(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_missing_root() {
        let err = RuntimePaths::resolve(Path::new("/definitely/not/a/venv")).unwrap_err();
        assert!(matches!(err, Error::RuntimeNotFound { .. }));
        assert!(err.to_string().contains("runtime not found"));
    }

    #[test]
    fn test_resolve_missing_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimePaths::resolve(dir.path()).unwrap_err();
        assert!(matches!(err, Error::RuntimeNotFound { .. }));
    }

    #[test]
    fn test_resolve_prefers_pip_binary() {
        let rt = fake_runtime(Some("exit 0"));
        let paths = RuntimePaths::resolve(rt.path()).unwrap();
        assert_eq!(paths.python, rt.path().join("bin").join("python"));
        assert_eq!(paths.installer, Installer::Pip(rt.path().join("bin").join("pip")));
    }

    #[test]
    fn test_resolve_falls_back_to_python_module() {
        let rt = fake_runtime(None);
        let paths = RuntimePaths::resolve(rt.path()).unwrap();
        assert!(matches!(paths.installer, Installer::PythonModule(_)));
    }

    #[test]
    fn test_install_records_each_module_once() {
        let rt = fake_runtime(Some(r#"echo "$2" >> "$(dirname "$0")/../installed.txt""#));
        let mut prov = Provisioner::new(
            RuntimePaths::resolve(rt.path()).unwrap(),
            Duration::from_secs(30),
        );
        let cancel = CancelToken::new();
        prov.ensure_available(&modules(&["requests", "numpy"]), &cancel).unwrap();
        prov.ensure_available(&modules(&["requests"]), &cancel).unwrap();

        let log = std::fs::read_to_string(rt.path().join("installed.txt")).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines, vec!["numpy", "requests"]);
        assert_eq!(prov.installed().len(), 2);
    }

    #[test]
    fn test_install_failure_is_hard_failure_without_rollback() {
        let rt = fake_runtime(Some(
            r#"if [ "$2" = "badpkg" ]; then echo "No matching distribution" >&2; exit 1; fi"#,
        ));
        let mut prov = Provisioner::new(
            RuntimePaths::resolve(rt.path()).unwrap(),
            Duration::from_secs(30),
        );
        let err = prov
            .ensure_available(&modules(&["aaa", "badpkg", "zzz"]), &CancelToken::new())
            .unwrap_err();
        match err {
            Error::DependencyInstall { module, failure, detail } => {
                assert_eq!(module, "badpkg");
                assert_eq!(failure, InstallFailure::ExitStatus(1));
                assert!(detail.contains("No matching distribution"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(prov.installed().contains("aaa"));
        assert!(!prov.installed().contains("zzz"));
    }

    #[test]
    fn test_install_timeout() {
        let rt = fake_runtime(Some("sleep 30"));
        let mut prov = Provisioner::new(
            RuntimePaths::resolve(rt.path()).unwrap(),
            Duration::from_millis(300),
        );
        let err = prov
            .ensure_available(&modules(&["slowpkg"]), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DependencyInstall { failure: InstallFailure::Timeout(_), .. }
        ));
    }

    #[test]
    fn test_install_launch_failure() {
        let rt = fake_runtime(Some("exit 0"));
        let mut paths = RuntimePaths::resolve(rt.path()).unwrap();
        paths.installer = Installer::Pip(rt.path().join("bin").join("no-such-pip"));
        let mut prov = Provisioner::new(paths, Duration::from_secs(5));
        let err = prov
            .ensure_available(&modules(&["requests"]), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DependencyInstall { failure: InstallFailure::Launch, .. }
        ));
    }
}
