//! Environment variable keys and alias chains.
//!
//! Primary variables use the `CODEMEND_*` prefix; common vendor names are
//! accepted as aliases.

/// Isolated runtime and execution limits
pub mod engine {
    /// Root of the pre-existing isolated runtime (a Python venv).
    pub const RUNTIME_DIR: &str = "CODEMEND_RUNTIME_DIR";
    pub const RUNTIME_DIR_ALIASES: &[&str] = &["VIRTUAL_ENV"];

    pub const EXEC_TIMEOUT_SECS: &str = "CODEMEND_EXEC_TIMEOUT_SECS";
    pub const INSTALL_TIMEOUT_SECS: &str = "CODEMEND_INSTALL_TIMEOUT_SECS";
    pub const MAX_RETRIES: &str = "CODEMEND_MAX_RETRIES";
}

/// LLM API used by the synthesis/repair collaborator
pub mod llm {
    pub const API_BASE: &str = "CODEMEND_API_BASE";
    pub const API_BASE_ALIASES: &[&str] = &["ANTHROPIC_BASE_URL", "OPENAI_API_BASE"];

    pub const API_KEY: &str = "CODEMEND_API_KEY";
    pub const API_KEY_ALIASES: &[&str] = &["ANTHROPIC_API_KEY", "OPENAI_API_KEY"];

    pub const MODEL: &str = "CODEMEND_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["ANTHROPIC_MODEL"];

    pub const MAX_TOKENS: &str = "CODEMEND_MAX_TOKENS";
}

/// Session transcript location
pub mod paths {
    pub const LOGS_DIR: &str = "CODEMEND_LOGS_DIR";
}

/// Observability and logging
pub mod observability {
    pub const QUIET: &str = "CODEMEND_QUIET";
    pub const LOG_LEVEL: &str = "CODEMEND_LOG_LEVEL";
    pub const LOG_JSON: &str = "CODEMEND_LOG_JSON";
    pub const AUDIT_LOG: &str = "CODEMEND_AUDIT_LOG";
}
