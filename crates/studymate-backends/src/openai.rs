use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use studymate_core::config::HostedBackendConfig;
use studymate_core::error::BackendError;
use studymate_core::traits::Backend;
use studymate_core::types::{Availability, BackendId, GenerationConfig, GenerationRequest};

use crate::http::{build_client, is_local_url, send_json};
use crate::prompt::{build_prompt, SYSTEM_PROMPT};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI-compatible chat completions adapter.
pub struct OpenAiBackend {
    id: BackendId,
    enabled: bool,
    client: Option<Client>,
    base_url: String,
    model: String,
    api_key: Option<String>,
    generation: GenerationConfig,
    max_context_chars: usize,
}

impl OpenAiBackend {
    pub fn from_config(cfg: &HostedBackendConfig) -> Self {
        let base_url = cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            id: BackendId::new("openai"),
            enabled: cfg.enabled,
            client: build_client(cfg.request_timeout_ms),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: cfg.resolve_api_key(DEFAULT_API_KEY_ENV),
            generation: cfg.generation(),
            max_context_chars: cfg.max_prompt_context_chars,
        }
    }

    pub fn build_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(request, self.max_context_chars)},
            ],
            "temperature": self.generation.temperature,
            "max_tokens": self.generation.max_output_tokens,
            "stream": false,
        })
    }

    pub fn parse_response(body: &Value) -> Result<String, BackendError> {
        let text = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::malformed("No message content in response"))?
            .trim();
        if text.is_empty() {
            return Err(BackendError::malformed("Empty completion"));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn display_name(&self) -> &str {
        "OpenAI"
    }

    fn health(&self) -> Availability {
        let credentials = self.api_key.is_some() || is_local_url(&self.base_url);
        if self.enabled && credentials && self.client.is_some() && !self.model.is_empty() {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let client = match (&self.client, self.health()) {
            (Some(client), Availability::Available) => client,
            _ => return Err(BackendError::unavailable("OpenAI backend is not configured")),
        };
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "sending chat completion request");

        let mut builder = client.post(&url).json(&self.build_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let body = send_json(builder).await?;
        Self::parse_response(&body)
    }
}
