//! Bounded execute-then-repair loop.
//!
//! ```text
//! Executing(a, code) --success--------------------> done (result, code, a+1)
//!        |--failure, a == max_retries------------> done (result, code, max_retries+1)
//!        '--failure, a <  max_retries--> Repairing(a, code, result)
//! Repairing(a, ...) --candidate--> Executing(a+1, candidate.source)
//!        '--collaborator error-------------------> done (result, code, a+1)
//! ```
//!
//! Attempts run strictly one after another: each repair needs the previous
//! attempt's error text. At most `max_retries + 1` executions happen no
//! matter what the collaborator returns.

use codemend_core::{Candidate, CollaboratorError, Repairer};
use codemend_sandbox::{CancelToken, ExecutionResult, Executor};
use thiserror::Error;

/// Something that can execute a script once and report the outcome.
pub trait ScriptRunner {
    fn run_script(
        &mut self,
        source: &str,
        install_deps: bool,
        cancel: &CancelToken,
    ) -> codemend_sandbox::Result<ExecutionResult>;
}

impl ScriptRunner for Executor {
    fn run_script(
        &mut self,
        source: &str,
        install_deps: bool,
        cancel: &CancelToken,
    ) -> codemend_sandbox::Result<ExecutionResult> {
        self.run(source, install_deps, cancel)
    }
}

/// Per-attempt diagnostics sink. All methods default to no-ops.
pub trait AttemptObserver {
    fn attempt_started(&mut self, _attempt: u32, _code: &str) {}
    fn attempt_finished(&mut self, _attempt: u32, _result: &ExecutionResult) {}
    /// `attempt` is the 1-based repair round that produced `candidate`
    fn repaired(&mut self, _attempt: u32, _error_text: &str, _candidate: &Candidate) {}
    fn repair_failed(&mut self, _attempt: u32, _error: &CollaboratorError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {}

/// Repairer for callers that run without a collaborator (e.g. `max_retries == 0`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRepair;

impl Repairer for NoRepair {
    fn repair(
        &self,
        _request: &str,
        _prior_code: &str,
        _error_text: &str,
        _attempt: u32,
    ) -> Result<Candidate, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no repair collaborator configured".to_string(),
        ))
    }
}

/// Terminal outcome of the loop.
#[derive(Debug)]
pub struct RetryOutcome {
    /// Result of the last execution that ran
    pub result: ExecutionResult,
    /// Code that produced `result`
    pub final_code: String,
    /// Attempts consumed, `1..=max_retries + 1`
    pub attempts: u32,
    /// Set when the loop stopped early because the collaborator failed
    pub repair_error: Option<CollaboratorError>,
}

#[derive(Debug, Error)]
pub enum RetryError {
    /// Caller cancelled; the in-flight attempt's partial result is discarded
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Sandbox(codemend_sandbox::Error),
}

impl From<codemend_sandbox::Error> for RetryError {
    fn from(e: codemend_sandbox::Error) -> Self {
        match e {
            codemend_sandbox::Error::Cancelled => Self::Cancelled,
            other => Self::Sandbox(other),
        }
    }
}

enum State {
    Executing {
        attempt: u32,
        code: String,
    },
    Repairing {
        attempt: u32,
        code: String,
        result: ExecutionResult,
    },
}

pub struct RetryOrchestrator<'a, R: ScriptRunner + ?Sized> {
    runner: &'a mut R,
    repairer: &'a dyn Repairer,
    max_retries: u32,
    install_deps: bool,
}

impl<'a, R: ScriptRunner + ?Sized> RetryOrchestrator<'a, R> {
    pub fn new(runner: &'a mut R, repairer: &'a dyn Repairer, max_retries: u32) -> Self {
        Self {
            runner,
            repairer,
            max_retries,
            install_deps: true,
        }
    }

    pub fn install_deps(mut self, install: bool) -> Self {
        self.install_deps = install;
        self
    }

    /// Run `code`, repairing and re-running on failure.
    ///
    /// `request` is the original natural-language request, forwarded to the
    /// repairer for context.
    pub fn run(
        &mut self,
        request: &str,
        code: &str,
        observer: &mut dyn AttemptObserver,
        cancel: &CancelToken,
    ) -> Result<RetryOutcome, RetryError> {
        let mut state = State::Executing {
            attempt: 0,
            code: code.to_string(),
        };

        loop {
            state = match state {
                State::Executing { attempt, code } => {
                    if cancel.is_cancelled() {
                        return Err(RetryError::Cancelled);
                    }
                    tracing::info!(attempt = attempt + 1, max = self.max_retries + 1, "Executing");
                    observer.attempt_started(attempt + 1, &code);

                    let result = self.runner.run_script(&code, self.install_deps, cancel)?;
                    observer.attempt_finished(attempt + 1, &result);

                    if result.success {
                        return Ok(RetryOutcome {
                            result,
                            final_code: code,
                            attempts: attempt + 1,
                            repair_error: None,
                        });
                    }
                    if attempt >= self.max_retries {
                        tracing::info!(max_retries = self.max_retries, "Retry budget exhausted");
                        return Ok(RetryOutcome {
                            result,
                            final_code: code,
                            attempts: self.max_retries + 1,
                            repair_error: None,
                        });
                    }
                    State::Repairing {
                        attempt,
                        code,
                        result,
                    }
                }
                State::Repairing {
                    attempt,
                    code,
                    result,
                } => {
                    let error_text = repair_signal(&result);
                    tracing::info!(round = attempt + 1, "Execution failed, requesting repair");
                    match self.repairer.repair(request, &code, &error_text, attempt + 1) {
                        Ok(candidate) => {
                            if cancel.is_cancelled() {
                                return Err(RetryError::Cancelled);
                            }
                            observer.repaired(attempt + 1, &error_text, &candidate);
                            State::Executing {
                                attempt: attempt + 1,
                                code: candidate.source,
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Repair failed, stopping");
                            observer.repair_failed(attempt + 1, &e);
                            return Ok(RetryOutcome {
                                result,
                                final_code: code,
                                attempts: attempt + 1,
                                repair_error: Some(e),
                            });
                        }
                    }
                }
            };
        }
    }
}

/// Error text handed to the repairer: stderr, or a synthesized summary when
/// the script failed without writing to stderr.
fn repair_signal(result: &ExecutionResult) -> String {
    if !result.error.trim().is_empty() {
        return result.error.clone();
    }
    let mut text = format!("process exited with code {}", result.exit_code);
    if !result.output.trim().is_empty() {
        text.push_str("\nstdout:\n");
        text.push_str(&result.output);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    fn ok(out: &str) -> ExecutionResult {
        ExecutionResult {
            success: true,
            output: out.to_string(),
            error: String::new(),
            exit_code: 0,
            execution_time_secs: 0.01,
        }
    }

    fn fail(err: &str) -> ExecutionResult {
        ExecutionResult {
            success: false,
            output: String::new(),
            error: err.to_string(),
            exit_code: 1,
            execution_time_secs: 0.01,
        }
    }

    /// Returns queued results in order; records every script it was given.
    struct FakeRunner {
        results: VecDeque<codemend_sandbox::Result<ExecutionResult>>,
        seen: Vec<String>,
    }

    impl FakeRunner {
        fn new(results: Vec<codemend_sandbox::Result<ExecutionResult>>) -> Self {
            Self {
                results: results.into(),
                seen: Vec::new(),
            }
        }
    }

    impl ScriptRunner for FakeRunner {
        fn run_script(
            &mut self,
            source: &str,
            _install_deps: bool,
            _cancel: &CancelToken,
        ) -> codemend_sandbox::Result<ExecutionResult> {
            self.seen.push(source.to_string());
            self.results
                .pop_front()
                .unwrap_or_else(|| Ok(fail("unexpected extra run")))
        }
    }

    /// Hands out `fixed_<n>` candidates, or fails from round `fail_from` on.
    struct ScriptedRepairer {
        fail_from: Option<u32>,
        calls: RefCell<Vec<(String, String, u32)>>,
    }

    impl ScriptedRepairer {
        fn new(fail_from: Option<u32>) -> Self {
            Self {
                fail_from,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Repairer for ScriptedRepairer {
        fn repair(
            &self,
            _request: &str,
            prior_code: &str,
            error_text: &str,
            attempt: u32,
        ) -> Result<Candidate, CollaboratorError> {
            self.calls
                .borrow_mut()
                .push((prior_code.to_string(), error_text.to_string(), attempt));
            if self.fail_from.is_some_and(|n| attempt >= n) {
                return Err(CollaboratorError::Transport("connection reset".to_string()));
            }
            Ok(Candidate::from_source(format!("fixed_{}", attempt)))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Vec<String>,
    }

    impl AttemptObserver for RecordingObserver {
        fn attempt_started(&mut self, attempt: u32, _code: &str) {
            self.events.push(format!("start {}", attempt));
        }
        fn attempt_finished(&mut self, attempt: u32, result: &ExecutionResult) {
            self.events.push(format!("finish {} {}", attempt, result.success));
        }
        fn repaired(&mut self, attempt: u32, _error_text: &str, _candidate: &Candidate) {
            self.events.push(format!("repaired {}", attempt));
        }
        fn repair_failed(&mut self, attempt: u32, _error: &CollaboratorError) {
            self.events.push(format!("repair_failed {}", attempt));
        }
    }

    #[test]
    fn test_success_first_try_never_repairs() {
        let mut runner = FakeRunner::new(vec![Ok(ok("ok\n"))]);
        let repairer = ScriptedRepairer::new(None);
        let outcome = RetryOrchestrator::new(&mut runner, &repairer, 3)
            .run("req", "print('ok')", &mut NoopObserver, &CancelToken::new())
            .unwrap();
        assert!(outcome.result.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.final_code, "print('ok')");
        assert!(repairer.calls.borrow().is_empty());
    }

    #[test]
    fn test_zero_retries_single_attempt() {
        let mut runner = FakeRunner::new(vec![Ok(fail("ZeroDivisionError: division by zero"))]);
        let repairer = ScriptedRepairer::new(None);
        let outcome = RetryOrchestrator::new(&mut runner, &repairer, 0)
            .run("req", "print(1/0)", &mut NoopObserver, &CancelToken::new())
            .unwrap();
        assert!(!outcome.result.success);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.result.error.contains("division"));
        assert_eq!(runner.seen.len(), 1);
        assert!(repairer.calls.borrow().is_empty());
    }

    #[test]
    fn test_repair_then_success() {
        let mut runner = FakeRunner::new(vec![Ok(fail("NameError: x")), Ok(ok("done"))]);
        let repairer = ScriptedRepairer::new(None);
        let mut observer = RecordingObserver::default();
        let outcome = RetryOrchestrator::new(&mut runner, &repairer, 2)
            .run("req", "print(x)", &mut observer, &CancelToken::new())
            .unwrap();
        assert!(outcome.result.success);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.final_code, "fixed_1");
        assert_eq!(runner.seen, vec!["print(x)", "fixed_1"]);

        let calls = repairer.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("print(x)".to_string(), "NameError: x".to_string(), 1));
        assert_eq!(
            observer.events,
            vec!["start 1", "finish 1 false", "repaired 1", "start 2", "finish 2 true"]
        );
    }

    #[test]
    fn test_exhausting_retries_bounds_executions() {
        for k in 0..4u32 {
            let results = (0..10).map(|_| Ok(fail("boom"))).collect();
            let mut runner = FakeRunner::new(results);
            let repairer = ScriptedRepairer::new(None);
            let outcome = RetryOrchestrator::new(&mut runner, &repairer, k)
                .run("req", "code", &mut NoopObserver, &CancelToken::new())
                .unwrap();
            assert_eq!(runner.seen.len() as u32, k + 1);
            assert_eq!(outcome.attempts, k + 1);
            assert_eq!(repairer.calls.borrow().len() as u32, k);
            assert_eq!(outcome.final_code, if k == 0 { "code".to_string() } else { format!("fixed_{}", k) });
        }
    }

    #[test]
    fn test_collaborator_failure_aborts_with_last_result() {
        let mut runner = FakeRunner::new(vec![Ok(fail("first")), Ok(fail("second")), Ok(ok("x"))]);
        let repairer = ScriptedRepairer::new(Some(2));
        let mut observer = RecordingObserver::default();
        let outcome = RetryOrchestrator::new(&mut runner, &repairer, 5)
            .run("req", "orig", &mut observer, &CancelToken::new())
            .unwrap();
        assert_eq!(runner.seen, vec!["orig", "fixed_1"]);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.result.error, "second");
        assert_eq!(outcome.final_code, "fixed_1");
        assert!(matches!(outcome.repair_error, Some(CollaboratorError::Transport(_))));
        assert_eq!(observer.events.last().map(String::as_str), Some("repair_failed 2"));
    }

    #[test]
    fn test_cancel_before_first_attempt() {
        let mut runner = FakeRunner::new(vec![Ok(ok("x"))]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = RetryOrchestrator::new(&mut runner, &NoRepair, 2)
            .run("req", "code", &mut NoopObserver, &cancel)
            .unwrap_err();
        assert!(matches!(err, RetryError::Cancelled));
        assert!(runner.seen.is_empty());
    }

    #[test]
    fn test_cancelled_run_discards_partial_result() {
        let mut runner = FakeRunner::new(vec![Err(codemend_sandbox::Error::Cancelled)]);
        let repairer = ScriptedRepairer::new(None);
        let err = RetryOrchestrator::new(&mut runner, &repairer, 2)
            .run("req", "code", &mut NoopObserver, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, RetryError::Cancelled));
        assert!(repairer.calls.borrow().is_empty());
    }

    #[test]
    fn test_no_repair_stops_loop() {
        let mut runner = FakeRunner::new(vec![Ok(fail("bad")), Ok(ok("never"))]);
        let outcome = RetryOrchestrator::new(&mut runner, &NoRepair, 2)
            .run("req", "code", &mut NoopObserver, &CancelToken::new())
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.repair_error, Some(CollaboratorError::Unavailable(_))));
    }

    #[test]
    fn test_repair_signal_falls_back_to_exit_code() {
        let mut r = fail("");
        r.output = "partial".to_string();
        let text = repair_signal(&r);
        assert!(text.contains("exit"));
        assert!(text.contains("partial"));
        assert_eq!(repair_signal(&fail("Traceback")), "Traceback");
    }

    #[cfg(unix)]
    mod with_executor {
        use super::*;
        use codemend_sandbox::testing;

        const FAILING_PIP: &str = "echo 'ERROR: Could not find a version' >&2; exit 1";

        fn fake_runtime() -> tempfile::TempDir {
            testing::fake_runtime(Some(FAILING_PIP))
        }

        fn executor(rt: &tempfile::TempDir, timeout: u64) -> Executor {
            Executor::new(
                rt.path(),
                codemend_sandbox::ExecutionLimits {
                    exec_timeout_secs: timeout,
                    install_timeout_secs: 10,
                },
            )
            .unwrap()
        }

        #[test]
        fn test_ok_script_single_attempt() {
            let rt = fake_runtime();
            let mut exec = executor(&rt, 10);
            let repairer = ScriptedRepairer::new(None);
            let outcome = RetryOrchestrator::new(&mut exec, &repairer, 2)
                .run("say ok", "echo ok", &mut NoopObserver, &CancelToken::new())
                .unwrap();
            assert!(outcome.result.success);
            assert!(outcome.result.output.contains("ok"));
            assert_eq!(outcome.attempts, 1);
            assert!(repairer.calls.borrow().is_empty());
        }

        #[test]
        fn test_missing_dependency_reaches_repairer() {
            let rt = fake_runtime();
            let mut exec = executor(&rt, 10);
            let repairer = ScriptedRepairer::new(Some(1));
            let outcome = RetryOrchestrator::new(&mut exec, &repairer, 1)
                .run("req", "import missingpkg\necho hi", &mut NoopObserver, &CancelToken::new())
                .unwrap();
            assert!(!outcome.result.success);
            assert!(outcome.result.error.contains("dependency installation failed"));
            assert_eq!(outcome.attempts, 1);
            let calls = repairer.calls.borrow();
            assert!(calls[0].1.contains("missingpkg"));
        }

        #[test]
        fn test_timeout_is_repairable_failure() {
            let rt = fake_runtime();
            let mut exec = executor(&rt, 1);
            let repairer = ScriptedRepairer::new(None);
            let outcome = RetryOrchestrator::new(&mut exec, &repairer, 1)
                .run("req", "sleep 30", &mut NoopObserver, &CancelToken::new())
                .unwrap();
            // fixed_1 is not a valid shell command, so the second attempt fails too.
            assert_eq!(outcome.attempts, 2);
            assert_eq!(repairer.calls.borrow()[0].1, "execution timed out after 1s");
        }
    }
}
