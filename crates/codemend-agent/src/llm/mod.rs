//! Blocking LLM HTTP client for single-turn completions.
//!
//! Supports two API formats:
//!   - **OpenAI-compatible**: `/chat/completions`
//!   - **Claude Native**: `/v1/messages`
//!
//! Auto-detects which API to use based on model name or API base URL.

use std::time::Duration;

use codemend_core::CollaboratorError;
use serde_json::Value;

mod claude;
mod openai;

#[cfg(test)]
mod tests;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Claude,
    OpenAI,
}

/// Detect API format from model name or API base.
pub fn detect_api_format(model: &str, api_base: &str) -> ApiFormat {
    let model_lower = model.to_lowercase();
    let base_lower = api_base.to_lowercase();

    if model_lower.starts_with("claude")
        || base_lower.contains("anthropic")
        || base_lower.contains("claude")
    {
        ApiFormat::Claude
    } else {
        ApiFormat::OpenAI
    }
}

/// LLM client supporting both OpenAI and Claude API formats.
pub struct LlmClient {
    agent: ureq::Agent,
    api_base: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout_read(Duration::from_secs(READ_TIMEOUT_SECS))
            .build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Send one user prompt and return the reply text (auto-routes on model/api_base).
    pub fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        prompt: &str,
    ) -> Result<String, CollaboratorError> {
        let format = detect_api_format(model, &self.api_base);
        tracing::debug!(?format, model, prompt_chars = prompt.len(), "LLM request");

        let text = match format {
            ApiFormat::Claude => {
                let url = claude::messages_url(&self.api_base);
                let body = claude::request_body(model, max_tokens, prompt);
                let request = self
                    .agent
                    .post(&url)
                    .set("x-api-key", &self.api_key)
                    .set("anthropic-version", claude::API_VERSION)
                    .set("content-type", "application/json");
                let json = send(request, &url, body)?;
                claude::response_text(&json)
            }
            ApiFormat::OpenAI => {
                let url = openai::completions_url(&self.api_base);
                let body = openai::request_body(model, max_tokens, prompt);
                let request = self
                    .agent
                    .post(&url)
                    .set("Authorization", &format!("Bearer {}", self.api_key))
                    .set("Content-Type", "application/json");
                let json = send(request, &url, body)?;
                openai::response_text(&json)
            }
        };

        text.ok_or_else(|| CollaboratorError::Parse("response contained no text content".to_string()))
    }
}

fn send(request: ureq::Request, url: &str, body: Value) -> Result<Value, CollaboratorError> {
    let response = request.send_json(body).map_err(|e| match e {
        ureq::Error::Status(status, resp) => CollaboratorError::Api {
            status,
            body: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => {
            CollaboratorError::Transport(format!("cannot reach {}: {}", url, t))
        }
    })?;

    response
        .into_json::<Value>()
        .map_err(|e| CollaboratorError::Parse(format!("invalid JSON body: {}", e)))
}
