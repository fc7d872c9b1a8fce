use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use studymate_core::error::{BackendError, ErrorKind};

const MAX_BODY_IN_MESSAGE: usize = 200;

pub fn build_client(timeout_ms: u64) -> Option<Client> {
    Client::builder().timeout(Duration::from_millis(timeout_ms)).build().ok()
}

/// Local inference servers (Ollama, vLLM, LM Studio) run without credentials.
pub fn is_local_url(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}

/// Map a non-success HTTP status to a typed backend failure.
pub fn map_status(status: StatusCode, body: &str) -> BackendError {
    let snippet: String = body.chars().take(MAX_BODY_IN_MESSAGE).collect();
    match status.as_u16() {
        401 | 403 => {
            debug!(body = %snippet, "authentication failed ({})", status.as_u16());
            BackendError::new(ErrorKind::AuthFailed, format!("HTTP {}", status.as_u16()))
        }
        429 => BackendError::new(ErrorKind::RateLimited, format!("HTTP 429: {snippet}")),
        408 | 504 => BackendError::new(ErrorKind::Timeout, format!("HTTP {}: {snippet}", status.as_u16())),
        s if s >= 500 => BackendError::new(ErrorKind::Transport, format!("Server error ({s}): {snippet}")),
        s => BackendError::new(ErrorKind::Transport, format!("HTTP {s}: {snippet}")),
    }
}

pub fn map_request_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::new(ErrorKind::Timeout, format!("Request timed out: {e}"))
    } else {
        BackendError::new(ErrorKind::Transport, format!("Request failed: {e}"))
    }
}

/// Send a prepared request and decode its JSON body.
pub async fn send_json(request: RequestBuilder) -> Result<Value, BackendError> {
    let response = request.send().await.map_err(|e| map_request_error(&e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| map_request_error(&e))?;
    if !status.is_success() {
        return Err(map_status(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| BackendError::malformed(format!("Invalid JSON: {e}")))
}
