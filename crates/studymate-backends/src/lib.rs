//! Answer-generation adapters behind the shared `Backend` trait.
//!
//! - `openai`: OpenAI-compatible `/chat/completions` (also local servers such as Ollama)
//! - `gemini`: Google Gemini `generateContent`
//! - `local`: offline extractive answers from the retrieved context
use std::sync::Arc;

use studymate_core::config::BackendsConfig;
use studymate_core::traits::Backend;

pub mod gemini;
pub mod http;
pub mod local;
pub mod openai;
pub mod prompt;

pub use gemini::GeminiBackend;
pub use local::LocalBackend;
pub use openai::OpenAiBackend;

/// One adapter per known service. Disabled or unconfigured adapters are still
/// returned so that status reporting can show them as unavailable.
pub fn build_backends(cfg: &BackendsConfig) -> Vec<Arc<dyn Backend>> {
    vec![
        Arc::new(OpenAiBackend::from_config(&cfg.openai)),
        Arc::new(GeminiBackend::from_config(&cfg.gemini)),
        Arc::new(LocalBackend::from_config(&cfg.local)),
    ]
}
