use async_trait::async_trait;

use studymate_core::chunker::split_sentences;
use studymate_core::config::LocalBackendConfig;
use studymate_core::error::{BackendError, ErrorKind};
use studymate_core::traits::Backend;
use studymate_core::types::{Availability, BackendId, GenerationRequest};

use crate::prompt::EMPTY_CONTEXT;

const SCANNED_SENTENCES: usize = 5;
const SUMMARY_WORDS: usize = 30;

/// Offline extractive answerer: quotes the context sentences that share the most
/// keywords with the question. Needs no credentials or network.
pub struct LocalBackend {
    id: BackendId,
    enabled: bool,
    max_sentences: usize,
}

impl LocalBackend {
    pub fn from_config(cfg: &LocalBackendConfig) -> Self {
        Self { id: BackendId::new("local"), enabled: cfg.enabled, max_sentences: cfg.max_sentences.max(1) }
    }

    pub fn answer(&self, question: &str, passages: &[String]) -> Result<String, BackendError> {
        if question.trim().is_empty() {
            return Err(BackendError::new(ErrorKind::Internal, "Empty question provided"));
        }
        let joined = passages.join(" ");
        let context = if joined.trim().is_empty() { EMPTY_CONTEXT.to_string() } else { joined };

        let keywords: Vec<String> = question
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() > 3)
            .collect();

        let mut scored: Vec<(String, usize)> = split_sentences(&context)
            .into_iter()
            .take(SCANNED_SENTENCES)
            .filter_map(|s| {
                let lower = s.to_lowercase();
                let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
                (hits > 0).then_some((s, hits))
            })
            .collect();

        if scored.is_empty() {
            let words: Vec<&str> = context.split_whitespace().take(SUMMARY_WORDS).collect();
            let topic: String = question.trim().chars().take(50).collect();
            return Ok(format!(
                "Regarding your question about '{topic}...': The document contains information about {}. \
                 Please ask more specific questions for detailed answers.",
                words.join(" ")
            ));
        }
        // stable: equal counts keep document order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        let best: Vec<String> = scored.into_iter().take(self.max_sentences).map(|(s, _)| s).collect();
        Ok(format!("Based on the document: {}", best.join(" ")))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Fast AI"
    }

    fn health(&self) -> Availability {
        if self.enabled { Availability::Available } else { Availability::Unavailable }
    }

    fn supports_restructure(&self) -> bool {
        false
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        if !self.enabled {
            return Err(BackendError::unavailable("local backend is disabled"));
        }
        self.answer(&request.question, &request.passages)
    }
}
