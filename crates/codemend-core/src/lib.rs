pub mod collaborator;
pub mod config;
pub mod observability;

pub use collaborator::{Candidate, CollaboratorError, Repairer, Synthesizer};
