//! LLM-backed collaborator: turns requests into code and repairs failing code.

pub mod collaborator;
pub mod llm;
pub mod parse;
pub mod prompt;

pub use collaborator::LlmCollaborator;
pub use llm::{detect_api_format, ApiFormat, LlmClient};
