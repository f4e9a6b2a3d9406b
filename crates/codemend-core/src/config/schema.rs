//! Configuration structs grouped by concern, loaded from the environment.

use super::env_keys::{engine, llm, observability as obv_keys, paths};
use super::loader::{env_bool, env_optional, env_or, env_parse, load_dotenv};
use std::path::PathBuf;

/// Default wall-clock budget for one script execution.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 60;

/// Default budget for installing a single package.
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 300;

/// Default number of repair rounds after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Execution engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the isolated runtime (venv)
    pub runtime_dir: PathBuf,
    pub exec_timeout_secs: u64,
    pub install_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime_dir: default_runtime_dir(),
            exec_timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
            install_timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let runtime_dir = env_optional(engine::RUNTIME_DIR, engine::RUNTIME_DIR_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(default_runtime_dir);
        Self {
            runtime_dir,
            exec_timeout_secs: env_parse(engine::EXEC_TIMEOUT_SECS, &[], DEFAULT_EXEC_TIMEOUT_SECS),
            install_timeout_secs: env_parse(
                engine::INSTALL_TIMEOUT_SECS,
                &[],
                DEFAULT_INSTALL_TIMEOUT_SECS,
            ),
            max_retries: env_parse(engine::MAX_RETRIES, &[], DEFAULT_MAX_RETRIES),
        }
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(
        mut self,
        runtime_dir: Option<PathBuf>,
        exec_timeout_secs: Option<u64>,
        max_retries: Option<u32>,
    ) -> Self {
        if let Some(dir) = runtime_dir {
            self.runtime_dir = dir;
        }
        if let Some(t) = exec_timeout_secs {
            self.exec_timeout_secs = t;
        }
        if let Some(r) = max_retries {
            self.max_retries = r;
        }
        self
    }
}

fn default_runtime_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("venv")
}

/// LLM API configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Load from the environment; missing values use defaults (loads `.env`).
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            api_base: env_or(llm::API_BASE, llm::API_BASE_ALIASES, || {
                "https://api.anthropic.com".to_string()
            }),
            api_key: env_or(llm::API_KEY, llm::API_KEY_ALIASES, String::new),
            model: env_or(llm::MODEL, llm::MODEL_ALIASES, || {
                "claude-sonnet-4-20250514".to_string()
            }),
            max_tokens: env_parse(llm::MAX_TOKENS, &[], 20_000),
        }
    }

    /// Like `from_env`, but `None` when the API key or base is empty.
    pub fn try_from_env() -> Option<Self> {
        let cfg = Self::from_env();
        if cfg.api_key.trim().is_empty() || cfg.api_base.trim().is_empty() {
            None
        } else {
            Some(cfg)
        }
    }
}

/// Output locations
#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Parent directory of per-session transcript folders
    pub logs_dir: PathBuf,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            logs_dir: PathBuf::from(env_or(paths::LOGS_DIR, &[], || "logs".to_string())),
        }
    }
}

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::QUIET, &[], false),
                log_level: env_or(obv_keys::LOG_LEVEL, &[], || "codemend=info".to_string()),
                log_json: env_bool(obv_keys::LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::AUDIT_LOG, &[]),
            }
        })
    }
}
