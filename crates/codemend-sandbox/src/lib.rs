pub mod cancel;
pub mod common;
pub mod deps;
pub mod env;
pub mod error;
pub mod log;
pub mod runner;
pub mod staging;
#[cfg(all(unix, any(test, feature = "test-support")))]
pub mod testing;

pub use cancel::CancelToken;
pub use error::{Error, InstallFailure, Result};
pub use runner::{ExecutionLimits, ExecutionResult, Executor};
