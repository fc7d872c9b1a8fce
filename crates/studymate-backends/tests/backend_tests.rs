use serde_json::json;

use studymate_backends::{build_backends, GeminiBackend, LocalBackend, OpenAiBackend};
use studymate_core::config::{BackendsConfig, HostedBackendConfig, LocalBackendConfig};
use studymate_core::error::ErrorKind;
use studymate_core::traits::Backend;
use studymate_core::types::{Availability, GenerationRequest};

fn hosted(api_key: Option<&str>, base_url: Option<&str>) -> HostedBackendConfig {
    HostedBackendConfig {
        api_key: api_key.map(str::to_string),
        api_key_env: Some("STUDYMATE_TEST_KEY_NOT_SET".into()),
        base_url: base_url.map(str::to_string),
        ..HostedBackendConfig::default()
    }
}

fn request() -> GenerationRequest {
    GenerationRequest::new("What converts light to energy?", vec!["Photosynthesis converts light into energy.".into()])
}

#[test]
fn openai_body_carries_generation_config() {
    let backend = OpenAiBackend::from_config(&hosted(Some("sk-test"), None));
    let body = backend.build_body(&request());
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 500);
    assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    assert_eq!(body["messages"][0]["role"], "system");
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Photosynthesis converts light into energy."));
    assert!(user.contains("Question: What converts light to energy?"));
}

#[test]
fn openai_parse() {
    let ok = json!({"choices": [{"message": {"role": "assistant", "content": "  Photosynthesis.  "}}]});
    assert_eq!(OpenAiBackend::parse_response(&ok).unwrap(), "Photosynthesis.");

    let empty = json!({"choices": [{"message": {"content": "   "}}]});
    assert_eq!(OpenAiBackend::parse_response(&empty).unwrap_err().kind, ErrorKind::MalformedResponse);
    assert_eq!(OpenAiBackend::parse_response(&json!({"choices": []})).unwrap_err().kind, ErrorKind::MalformedResponse);
}

#[test]
fn openai_health_needs_key_unless_local() {
    assert_eq!(OpenAiBackend::from_config(&hosted(None, None)).health(), Availability::Unavailable);
    assert_eq!(OpenAiBackend::from_config(&hosted(Some("sk"), None)).health(), Availability::Available);
    assert_eq!(OpenAiBackend::from_config(&hosted(None, Some("http://localhost:11434/v1"))).health(), Availability::Available);

    let disabled = HostedBackendConfig { enabled: false, ..hosted(Some("sk"), None) };
    assert_eq!(OpenAiBackend::from_config(&disabled).health(), Availability::Unavailable);
}

#[tokio::test]
async fn unconfigured_backend_fails_without_network() {
    let backend = GeminiBackend::from_config(&hosted(None, Some("http://127.0.0.1:9")));
    let err = backend.generate(&request()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unavailable);
}

#[test]
fn gemini_body_and_endpoint() {
    let backend = GeminiBackend::from_config(&hosted(Some("g-key"), Some("https://example.test/v1beta/")));
    assert_eq!(backend.endpoint(), "https://example.test/v1beta/models/gemini-1.5-flash:generateContent");
    let body = backend.build_body(&request());
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 500);
    assert!(body["contents"][0]["parts"][0]["text"].as_str().unwrap().contains("Context from document"));
}

#[test]
fn gemini_parse_joins_parts() {
    let body = json!({"candidates": [{"content": {"parts": [{"text": "Light "}, {"text": "energy."}]}}]});
    assert_eq!(GeminiBackend::parse_response(&body).unwrap(), "Light energy.");

    let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
    let err = GeminiBackend::parse_response(&blocked).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedResponse);
    assert!(err.message.contains("SAFETY"));
}

#[test]
fn local_answer_quotes_matching_sentences() {
    let backend = LocalBackend::from_config(&LocalBackendConfig::default());
    let passages = vec!["Plants use chlorophyll. Photosynthesis converts light into energy. Roots absorb water.".to_string()];
    let answer = backend.answer("What converts light to energy?", &passages).unwrap();
    assert_eq!(answer, "Based on the document: Photosynthesis converts light into energy.");
}

#[test]
fn local_answer_without_matches_summarizes() {
    let backend = LocalBackend::from_config(&LocalBackendConfig::default());
    let answer = backend.answer("Why volcanoes?", &["Plants use chlorophyll.".to_string()]).unwrap();
    assert!(answer.starts_with("Regarding your question about 'Why volcanoes?...'"));
    assert!(answer.contains("Plants use chlorophyll."));

    let none = backend.answer("Tell me about volcanoes", &[]).unwrap();
    assert!(none.contains("No specific context provided."));
}

#[tokio::test]
async fn local_backend_rejects_empty_question() {
    let backend = LocalBackend::from_config(&LocalBackendConfig::default());
    assert!(!backend.supports_restructure());
    let err = backend.generate(&GenerationRequest::new("  ", vec![])).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}

#[test]
fn every_known_backend_is_built() {
    let cfg = BackendsConfig {
        openai: hosted(None, None),
        gemini: hosted(None, None),
        local: LocalBackendConfig::default(),
    };
    let backends = build_backends(&cfg);
    let ids: Vec<_> = backends.iter().map(|b| b.id().to_string()).collect();
    assert_eq!(ids, vec!["openai", "gemini", "local"]);
    let available: Vec<_> = backends.iter().filter(|b| b.health() == Availability::Available).map(|b| b.id().to_string()).collect();
    assert_eq!(available, vec!["local"]);
}
