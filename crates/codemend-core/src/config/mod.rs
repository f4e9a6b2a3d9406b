//! Unified configuration layer.
//!
//! Every environment variable read lives here; engine and CLI code access
//! structured config instead of calling `std::env::var` directly.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool`, `.env` loading
//! - `schema`: `EngineConfig`, `LlmConfig`, `PathsConfig`, `ObservabilityConfig`
//! - `env_keys`: key constants and their aliases

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_parse, load_dotenv, set_env_var};
pub use schema::{EngineConfig, LlmConfig, ObservabilityConfig, PathsConfig};
