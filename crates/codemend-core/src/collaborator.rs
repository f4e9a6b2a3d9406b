//! Contracts for the code synthesis / repair collaborator.
//!
//! The engine never talks to an LLM directly; it calls these traits and
//! treats every failure as an explicit `CollaboratorError` value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A code artifact proposed by the collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Script source text
    pub source: String,
    /// Human-readable explanation of what the code does (or what was fixed)
    pub explanation: String,
    /// Third-party packages the collaborator says the code needs, in declared order
    pub declared_dependencies: Vec<String>,
}

impl Candidate {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Infrastructure failure of a collaborator call. Aborts the retry loop.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unreachable: {0}")]
    Transport(String),

    #[error("collaborator API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("could not parse collaborator response: {0}")]
    Parse(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Turns a natural-language request into a first candidate.
pub trait Synthesizer {
    fn synthesize(&self, request: &str) -> Result<Candidate, CollaboratorError>;
}

/// Proposes corrected code given the failing code and its error text.
///
/// `attempt` is the 1-based repair round.
pub trait Repairer {
    fn repair(
        &self,
        request: &str,
        prior_code: &str,
        error_text: &str,
        attempt: u32,
    ) -> Result<Candidate, CollaboratorError>;
}
