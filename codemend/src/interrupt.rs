//! Ctrl+C handling: the first press cancels cooperatively, the second exits.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use codemend_sandbox::CancelToken;

use crate::commands::EXIT_CANCELLED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Ask the running command to stop at its next checkpoint
    Cancel,
    /// Leave now; the command did not react to the first press
    ForceExit,
}

/// Shared between the signal handler and the running command.
#[derive(Default)]
pub struct Interrupt {
    current: Mutex<CancelToken>,
    presses: AtomicU32,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the next press will cancel.
    pub fn token(&self) -> CancelToken {
        self.lock().clone()
    }

    /// Start a new unit of work: swap in an uncancelled token and forget
    /// earlier presses.
    pub fn fresh_token(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.lock() = token.clone();
        self.presses.store(0, Ordering::SeqCst);
        token
    }

    /// Record one press. Cancels the current token on the first one.
    pub fn on_signal(&self) -> InterruptAction {
        let prior = self.presses.fetch_add(1, Ordering::SeqCst);
        if prior == 0 {
            self.lock().cancel();
            InterruptAction::Cancel
        } else {
            InterruptAction::ForceExit
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CancelToken> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Install the process-wide handler.
pub fn install(interrupt: Arc<Interrupt>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || match interrupt.on_signal() {
        InterruptAction::Cancel => {
            tracing::info!("Received Ctrl+C, cancelling");
            eprintln!("\nCancelling... (waiting for the current step; press Ctrl+C again to quit now)");
        }
        InterruptAction::ForceExit => {
            eprintln!("\nAborted.");
            std::process::exit(EXIT_CANCELLED);
        }
    })
}
