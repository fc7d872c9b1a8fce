//! Google Gemini adapter.
//!
//! Auth is the `?key=` query parameter; the answer is the concatenation of
//! `candidates[0].content.parts[*].text`.
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use studymate_core::config::HostedBackendConfig;
use studymate_core::error::BackendError;
use studymate_core::traits::Backend;
use studymate_core::types::{Availability, BackendId, GenerationConfig, GenerationRequest};

use crate::http::{build_client, send_json};
use crate::prompt::{build_prompt, SYSTEM_PROMPT};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub struct GeminiBackend {
    id: BackendId,
    enabled: bool,
    client: Option<Client>,
    base_url: String,
    model: String,
    api_key: Option<String>,
    generation: GenerationConfig,
    max_context_chars: usize,
}

impl GeminiBackend {
    pub fn from_config(cfg: &HostedBackendConfig) -> Self {
        let base_url = cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            id: BackendId::new("gemini"),
            enabled: cfg.enabled,
            client: build_client(cfg.request_timeout_ms),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: cfg.resolve_api_key(DEFAULT_API_KEY_ENV),
            generation: cfg.generation(),
            max_context_chars: cfg.max_prompt_context_chars,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn build_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "contents": [{"role": "user", "parts": [{"text": build_prompt(request, self.max_context_chars)}]}],
            "generationConfig": {
                "temperature": self.generation.temperature,
                "maxOutputTokens": self.generation.max_output_tokens,
            },
        })
    }

    pub fn parse_response(body: &Value) -> Result<String, BackendError> {
        let Some(candidate) = body.get("candidates").and_then(|c| c.get(0)) else {
            let reason = body
                .get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            return Err(BackendError::malformed(format!("No candidates in response: {reason}")));
        };
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::malformed("No content parts in candidate"))?;
        let text: String = parts.iter().filter_map(|p| p.get("text").and_then(Value::as_str)).collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::malformed("Empty completion"));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Gemini"
    }

    fn health(&self) -> Availability {
        if self.enabled && self.api_key.is_some() && self.client.is_some() && !self.model.is_empty() {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let (client, key) = match (&self.client, &self.api_key, self.health()) {
            (Some(client), Some(key), Availability::Available) => (client, key),
            _ => return Err(BackendError::unavailable("Gemini backend is not configured")),
        };
        let url = self.endpoint();
        debug!(url = %url, model = %self.model, "sending generateContent request");
        let builder = client.post(&url).query(&[("key", key.as_str())]).json(&self.build_body(request));
        let body = send_json(builder).await?;
        Self::parse_response(&body)
    }
}
