//! Shared process plumbing for the installer and the script executor.
//!
//! Both spawn a child, drain its pipes on background threads, and poll for
//! exit against a wall-clock deadline and a cancellation flag.

use std::io::Read;
use std::process::{Child, Command};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;

// ============================================================
// Limits (single source of truth for the sandbox crate)
// ============================================================

pub use codemend_core::config::schema::{DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_INSTALL_TIMEOUT_SECS};

/// How often the wait loop checks for exit, timeout and cancellation
pub const POLL_INTERVAL_MS: u64 = 100;

/// Why the wait loop killed the child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    Timeout,
    Cancelled,
}

impl KillReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Everything observed about a finished (or killed) child
#[derive(Debug)]
pub struct WaitOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; -1 when killed or terminated by a signal
    pub exit_code: i32,
    pub killed: Option<KillReason>,
}

/// Put the child in its own process group so a kill reaches its descendants too.
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Extra time granted to the pipe readers once the child is gone
pub const READER_GRACE_MS: u64 = 500;

/// SIGKILL every process left in the child's group. The group id is the
/// child's pid because of `isolate_process_group`. Returns false when no
/// such group exists any more.
fn kill_group(child: &Child) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL).is_ok()
    }
    #[cfg(not(unix))]
    {
        let _ = child;
        false
    }
}

/// Kill the child and everything in its process group, then reap it.
fn kill_and_reap(child: &mut Child) {
    if !kill_group(child) {
        tracing::debug!(pid = child.id(), "killpg failed, falling back to kill");
        let _ = child.kill();
    }
    let _ = child.wait();
}

/// Background drain of one pipe. Bytes land in a shared buffer so a reader
/// that never sees EOF can be abandoned without losing what it already read.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut b) = sink.lock() {
                            b.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Wait for EOF until `deadline`, then return whatever was read.
    fn finish(self, deadline: Instant) -> String {
        let wait = deadline.saturating_duration_since(Instant::now());
        if let Err(mpsc::RecvTimeoutError::Timeout) = self.done.recv_timeout(wait) {
            tracing::debug!("Pipe still held open by a detached process; keeping partial output");
        }
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn finish(reader: Option<PipeReader>, deadline: Instant) -> String {
    reader.map(|r| r.finish(deadline)).unwrap_or_default()
}

/// Wait for `child` while enforcing `timeout` and watching `cancel`.
///
/// stdout/stderr are drained on background threads while the child runs;
/// a child writing more than the pipe buffer (~64KB) would otherwise block
/// forever on write while we wait for it to exit.
///
/// Whatever ends the wait (exit, timeout, cancellation) the child's process
/// group is killed before returning, so background descendants never outlive
/// the call. Readers are joined against the deadline: a descendant that left
/// the group and still holds a pipe costs at most the remaining budget plus
/// `READER_GRACE_MS`.
pub fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancelToken,
) -> std::io::Result<WaitOutcome> {
    let start = Instant::now();
    let poll = Duration::from_millis(POLL_INTERVAL_MS);
    let grace = Duration::from_millis(READER_GRACE_MS);

    let stdout = child.stdout.take().map(PipeReader::spawn);
    let stderr = child.stderr.take().map(PipeReader::spawn);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                // Reap background descendants still sitting in the group.
                if kill_group(child) {
                    tracing::debug!(pid = child.id(), "Killed leftover processes in child's group");
                }
                let deadline = (start + timeout).max(Instant::now() + grace);
                return Ok(WaitOutcome {
                    stdout: finish(stdout, deadline),
                    stderr: finish(stderr, deadline),
                    exit_code: status.code().unwrap_or(-1),
                    killed: None,
                });
            }
            Ok(None) => {}
            Err(e) => {
                kill_and_reap(child);
                let deadline = Instant::now() + grace;
                let _ = finish(stdout, deadline);
                let _ = finish(stderr, deadline);
                return Err(e);
            }
        }

        let reason = if cancel.is_cancelled() {
            Some(KillReason::Cancelled)
        } else if start.elapsed() > timeout {
            Some(KillReason::Timeout)
        } else {
            None
        };

        if let Some(reason) = reason {
            tracing::debug!(pid = child.id(), reason = reason.as_str(), "Killing child process");
            kill_and_reap(child);
            let deadline = Instant::now() + grace;
            return Ok(WaitOutcome {
                stdout: finish(stdout, deadline),
                stderr: finish(stderr, deadline),
                exit_code: -1,
                killed: Some(reason),
            });
        }

        thread::sleep(poll);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    fn sh(script: &str) -> Child {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);
        cmd.spawn().unwrap()
    }

    #[test]
    fn test_captures_streams_and_exit_code() {
        let mut child = sh("echo out; echo err >&2; exit 3");
        let outcome =
            wait_with_timeout(&mut child, Duration::from_secs(10), &CancelToken::new()).unwrap();
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.killed, None);
    }

    #[test]
    fn test_timeout_kills_whole_group() {
        let started = Instant::now();
        let mut child = sh("sleep 30; echo never");
        let outcome =
            wait_with_timeout(&mut child, Duration::from_millis(300), &CancelToken::new())
                .unwrap();
        assert_eq!(outcome.killed, Some(KillReason::Timeout));
        assert_eq!(outcome.exit_code, -1);
        assert!(!outcome.stdout.contains("never"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_background_descendant_does_not_hold_the_wait() {
        let started = Instant::now();
        let mut child = sh("sleep 30 &\necho parent-done");
        let outcome =
            wait_with_timeout(&mut child, Duration::from_secs(20), &CancelToken::new()).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.killed, None);
        assert_eq!(outcome.stdout.trim(), "parent-done");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_detached_descendant_costs_at_most_the_budget() {
        // `setsid` moves the sleeper out of the group, so only the deadline frees us.
        if Command::new("setsid").arg("true").status().is_err() {
            return;
        }
        let started = Instant::now();
        let mut child = sh("setsid sleep 30 &\necho early");
        let outcome =
            wait_with_timeout(&mut child, Duration::from_secs(1), &CancelToken::new()).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.contains("early"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_kills_child() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut child = sh("sleep 30");
        let outcome = wait_with_timeout(&mut child, Duration::from_secs(30), &cancel).unwrap();
        assert_eq!(outcome.killed, Some(KillReason::Cancelled));
    }

    #[test]
    fn test_large_output_does_not_deadlock() {
        let mut child = sh("i=0; while [ $i -lt 20000 ]; do echo 0123456789; i=$((i+1)); done");
        let outcome =
            wait_with_timeout(&mut child, Duration::from_secs(30), &CancelToken::new()).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.len() >= 200_000);
    }
}
