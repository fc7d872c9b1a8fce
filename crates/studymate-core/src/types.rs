//! Domain types shared by the chunker, indexes, backends and orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::error::{BackendError, ErrorKind};

pub type PassageId = usize;

/// An uploaded document, already decoded into page texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub pages: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, pages: Vec<String>) -> Self {
        Self { id: id.into(), pages }
    }
}

/// A bounded span of document text, the unit of retrieval.
///
/// - `id`: dense position in chunking order, starting at 0
/// - `source_page`: zero-based index into `Document::pages`
/// - `embedding`: populated only when the owning index runs in vector mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub text: String,
    pub source_page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Indicates which scoring path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Lexical,
}

/// The minimal surface returned by both index kinds. Higher score is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub passage_id: PassageId,
    pub score: f32,
    pub source: SourceKind,
}

/// Sort hits by descending score, ties by ascending passage id, and keep the first `k`.
pub fn rank_hits(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.passage_id.cmp(&b.passage_id)));
    hits.truncate(k);
    hits
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Ordered retrieval output handed to the orchestrator and the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub passages: Vec<ScoredPassage>,
    pub source: SourceKind,
}

impl RetrievalResult {
    pub fn empty(source: SourceKind) -> Self {
        Self { passages: Vec::new(), source }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.passage.text.clone()).collect()
    }
}

/// Identifier of an answer-generation backend, e.g. `openai`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Unavailable,
}

/// A single user question and the backends it should be sent to.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub requested_backends: BTreeSet<BackendId>,
}

impl Query {
    pub fn new<I, B>(text: impl Into<String>, backends: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BackendId>,
    {
        Self { text: text.into(), requested_backends: backends.into_iter().map(Into::into).collect() }
    }
}

/// Fixed academic section skeleton an answer is reshaped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlineKind {
    SevenMark,
    FourteenMark,
}

impl OutlineKind {
    pub fn from_marks(marks: u8) -> Option<Self> {
        match marks {
            7 => Some(Self::SevenMark),
            14 => Some(Self::FourteenMark),
            _ => None,
        }
    }

    pub fn total_marks(self) -> u8 {
        self.sections().iter().map(|(_, m)| m).sum()
    }

    /// Section titles with their mark weights, in answer order.
    pub fn sections(self) -> &'static [(&'static str, u8)] {
        match self {
            Self::SevenMark => &[("Introduction", 1), ("Analysis", 5), ("Conclusion", 1)],
            Self::FourteenMark => &[("Introduction", 2), ("Analysis", 8), ("Evaluation", 3), ("Conclusion", 1)],
        }
    }
}

/// Heading line of one outline section, e.g. `**Introduction (1 mark)**`.
pub fn section_heading(title: &str, marks: u8) -> String {
    let unit = if marks == 1 { "mark" } else { "marks" };
    format!("**{title} ({marks} {unit})**")
}

/// Sampling parameters a backend adapter is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.3, max_output_tokens: 500 }
    }
}

/// Ask a backend to reshape an earlier answer into an outline.
#[derive(Debug, Clone)]
pub struct RestructureRequest {
    pub outline: OutlineKind,
    pub raw_answer: String,
}

/// Everything an adapter needs to build its prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question: String,
    pub passages: Vec<String>,
    pub restructure: Option<RestructureRequest>,
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>, passages: Vec<String>) -> Self {
        Self { question: question.into(), passages, restructure: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    Pending,
    Succeeded,
    Failed,
}

/// Outcome of one backend within one query round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCall {
    pub backend: BackendId,
    pub state: CallState,
    pub answer: Option<String>,
    pub error: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub latency: Duration,
}

impl BackendCall {
    pub fn pending(backend: BackendId) -> Self {
        Self { backend, state: CallState::Pending, answer: None, error: None, error_message: None, latency: Duration::ZERO }
    }

    pub fn succeeded(backend: BackendId, answer: String, latency: Duration) -> Self {
        Self { backend, state: CallState::Succeeded, answer: Some(answer), error: None, error_message: None, latency }
    }

    pub fn failed(backend: BackendId, error: &BackendError, latency: Duration) -> Self {
        Self {
            backend,
            state: CallState::Failed,
            answer: None,
            error: Some(error.kind),
            error_message: Some(error.message.clone()),
            latency,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == CallState::Succeeded
    }
}

/// The synthesized answer of a round plus per-backend attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedAnswer {
    pub text: String,
    pub contributors: Vec<BackendCall>,
    pub missing: Vec<BackendCall>,
}

impl CombinedAnswer {
    /// Human readable note naming backends that did not contribute, if any.
    pub fn missing_note(&self) -> Option<String> {
        if self.missing.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .missing
            .iter()
            .map(|c| match c.error {
                Some(kind) => format!("{} ({})", c.backend, kind),
                None => c.backend.to_string(),
            })
            .collect();
        Some(format!("Not included: {}", parts.join(", ")))
    }
}
