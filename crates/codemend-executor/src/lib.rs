pub mod retry;
pub mod transcript;

pub use retry::{
    AttemptObserver, NoopObserver, RetryError, RetryOrchestrator, RetryOutcome, ScriptRunner,
};
pub use transcript::{warn_on_err, SessionLog};
