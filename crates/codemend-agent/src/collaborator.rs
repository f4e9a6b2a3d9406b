//! `Synthesizer` / `Repairer` backed by an LLM.

use codemend_core::config::LlmConfig;
use codemend_core::{Candidate, CollaboratorError, Repairer, Synthesizer};

use crate::llm::LlmClient;
use crate::parse::parse_response;
use crate::prompt::{generation_prompt, repair_prompt};

pub struct LlmCollaborator {
    client: LlmClient,
    model: String,
    max_tokens: u32,
}

impl LlmCollaborator {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: LlmClient::new(&config.api_base, &config.api_key),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Build from the environment; `None` when no API key is configured.
    pub fn from_env() -> Option<Self> {
        LlmConfig::try_from_env().map(|cfg| Self::new(&cfg))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn ask(&self, prompt: &str) -> Result<Candidate, CollaboratorError> {
        let reply = self.client.complete(&self.model, self.max_tokens, prompt)?;
        let candidate = parse_response(&reply);
        // An empty script would "succeed" when run; treat it as a bad reply.
        if candidate.source.trim().is_empty() {
            return Err(CollaboratorError::Parse(
                "reply contained no ```python code block".to_string(),
            ));
        }
        Ok(candidate)
    }
}

impl Synthesizer for LlmCollaborator {
    fn synthesize(&self, request: &str) -> Result<Candidate, CollaboratorError> {
        tracing::info!(model = %self.model, "Generating code");
        self.ask(&generation_prompt(request))
    }
}

impl Repairer for LlmCollaborator {
    fn repair(
        &self,
        request: &str,
        prior_code: &str,
        error_text: &str,
        attempt: u32,
    ) -> Result<Candidate, CollaboratorError> {
        tracing::info!(model = %self.model, attempt, "Requesting code repair");
        self.ask(&repair_prompt(request, prior_code, error_text, attempt))
    }
}
