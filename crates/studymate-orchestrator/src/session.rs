use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use studymate_core::chunker::Chunker;
use studymate_core::config::Settings;
use studymate_core::error::{Error, Result};
use studymate_core::traits::{Backend, Embedder};
use studymate_core::types::{Availability, BackendCall, BackendId, CombinedAnswer, Document, GenerationRequest, OutlineKind, Query, RetrievalResult};
use studymate_retrieval::{DocumentIndex, Retriever};
use studymate_vector::{hash_content, progress_bar, EmbeddingCache};

use crate::formatter::{structure, StructuredAnswer};
use crate::orchestrator::Orchestrator;

/// Everything the presentation layer needs from one `ask`.
#[derive(Debug, Clone)]
pub struct Answer {
    pub combined: CombinedAnswer,
    pub calls: Vec<BackendCall>,
    pub retrieval: RetrievalResult,
    pub structured: Option<StructuredAnswer>,
    /// False when no passage cleared retrieval, so backends answered without context.
    pub grounded: bool,
}

impl Answer {
    /// Final answer text: the outline when one was requested, plus the missing-backend note.
    pub fn render(&self) -> String {
        let mut text = match &self.structured {
            Some(s) => s.render(),
            None => self.combined.text.clone(),
        };
        if let Some(note) = self.combined.missing_note() {
            text.push_str("\n\n_");
            text.push_str(&note);
            text.push('_');
        }
        text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub asked_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub contributors: Vec<BackendId>,
}

/// Usage totals over a session's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub questions: usize,
    /// Words across every question and answer.
    pub total_words: usize,
    /// Answers contributed per backend.
    pub responses: BTreeMap<BackendId, usize>,
}

impl SessionStats {
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        let mut stats = Self { questions: history.len(), ..Self::default() };
        for entry in history {
            stats.total_words += entry.question.split_whitespace().count() + entry.answer.split_whitespace().count();
            for backend in &entry.contributors {
                *stats.responses.entry(backend.clone()).or_default() += 1;
            }
        }
        stats
    }
}

/// One user's working state: the live document index, the backends and the chat history.
pub struct StudySession {
    chunker: Chunker,
    retriever: Retriever,
    orchestrator: Orchestrator,
    embedder: Option<Arc<dyn Embedder>>,
    cache: Arc<EmbeddingCache>,
    batch_size: usize,
    show_progress: bool,
    index: RwLock<Option<Arc<DocumentIndex>>>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl StudySession {
    pub fn new(settings: &Settings, backends: Vec<Arc<dyn Backend>>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self::with_orchestrator(settings, Orchestrator::new(backends, &settings.orchestrator), embedder)
    }

    pub fn with_orchestrator(settings: &Settings, orchestrator: Orchestrator, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            chunker: Chunker::new(settings.chunking.clone()),
            retriever: Retriever::new(settings.retrieval.clone()),
            orchestrator,
            embedder,
            cache: Arc::new(EmbeddingCache::new()),
            batch_size: settings.embedding.batch_size,
            show_progress: false,
            index: RwLock::new(None),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Show an embedding progress bar during `ingest`.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Number of cached passage embeddings; only the live document's passages are kept.
    pub fn cached_embeddings(&self) -> usize {
        self.cache.len()
    }

    pub async fn current_index(&self) -> Option<Arc<DocumentIndex>> {
        self.index.read().await.clone()
    }

    /// Chunk and index `document`, replacing the current index once the build completes.
    ///
    /// Queries issued during the build wait for it. On failure the previous index stays live.
    pub async fn ingest(&self, document: Document) -> Result<Arc<DocumentIndex>> {
        let passages = self.chunker.chunk(&document);
        if passages.is_empty() {
            warn!(document = %document.id, "document produced no passages");
            return Err(Error::EmptyDocument);
        }

        let mut slot = self.index.write().await;
        let embedder = self.embedder.clone();
        let cache = Arc::clone(&self.cache);
        let batch_size = self.batch_size;
        let show_progress = self.show_progress;
        let document_id = document.id.clone();
        let built = tokio::task::spawn_blocking(move || {
            let progress = if show_progress { progress_bar(passages.len()) } else { ProgressBar::hidden() };
            DocumentIndex::build(&document_id, passages, embedder, &cache, batch_size, &progress)
        })
        .await
        .map_err(|e| Error::Operation(format!("index build task failed: {e}")))??;

        let built = Arc::new(built);
        *slot = Some(Arc::clone(&built));
        let live: HashSet<String> = built.passages().iter().map(|p| hash_content(&p.text)).collect();
        if let Err(e) = self.cache.retain_content(&live) {
            warn!(error = %e, "could not prune embedding cache");
        }
        info!(document = %document.id, passages = built.len(), lexical_only = built.is_lexical_only(), "document ingested");
        Ok(built)
    }

    pub async fn ask(&self, query: &Query, outline: Option<OutlineKind>) -> Result<Answer> {
        let index = self.current_index().await.ok_or(Error::NoIndexBuilt)?;

        let k = self.retriever.top_k_for(outline);
        let retrieval = self.retriever.retrieve(&index, &query.text, k);
        let grounded = !retrieval.is_empty();
        if !grounded {
            warn!(document = %index.document_id(), "no passage cleared retrieval; asking without context");
        }

        let request = GenerationRequest::new(query.text.clone(), retrieval.texts());
        let calls = self.orchestrator.dispatch(&query.requested_backends, request).await;
        let combined = self.orchestrator.combine(calls.clone(), outline)?;

        let structured = match outline {
            Some(outline) => Some(structure(&self.orchestrator, &query.text, &combined, outline).await),
            None => None,
        };

        let answer = Answer { combined, calls, retrieval, structured, grounded };
        self.record(query, &answer);
        Ok(answer)
    }

    pub fn backend_status(&self) -> BTreeMap<BackendId, Availability> {
        self.orchestrator.status()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().map(|h| h.clone()).unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats::from_history(&self.history())
    }

    fn record(&self, query: &Query, answer: &Answer) {
        let entry = HistoryEntry {
            asked_at: Utc::now(),
            question: query.text.clone(),
            answer: answer.render(),
            contributors: answer.combined.contributors.iter().map(|c| c.backend.clone()).collect(),
        };
        match self.history.lock() {
            Ok(mut h) => h.push(entry),
            Err(e) => e.into_inner().push(entry),
        }
    }
}
