use std::sync::Arc;

use anyhow::{anyhow, Result as AnyResult};
use indicatif::ProgressBar;
use tracing::{info, warn};

use studymate_core::error::{Error, Result};
use studymate_core::traits::Embedder;
use studymate_core::types::{Passage, PassageId, SearchHit, SourceKind};
use studymate_text::LexicalIndex;
use studymate_vector::{embed_texts, EmbeddingCache, VectorIndex};

struct VectorPart {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
}

/// Searchable index over one document's passages.
///
/// Vector mode answers with cosine similarity; lexical postings are always
/// present so a failing query embedding can still be answered.
pub struct DocumentIndex {
    document_id: String,
    passages: Vec<Passage>,
    lexical: LexicalIndex,
    vector: Option<VectorPart>,
}

impl DocumentIndex {
    pub fn build(
        document_id: &str,
        passages: Vec<Passage>,
        embedder: Option<Arc<dyn Embedder>>,
        cache: &EmbeddingCache,
        batch_size: usize,
        progress: &ProgressBar,
    ) -> Result<Self> {
        if passages.is_empty() {
            return Err(Error::EmptyDocument);
        }
        let lexical = LexicalIndex::build(&passages);
        let mut passages = passages;

        let vector = match embedder {
            Some(embedder) => match build_vectors(&mut passages, embedder.as_ref(), cache, batch_size, progress) {
                Ok(index) => Some(VectorPart { index, embedder }),
                Err(e) => {
                    warn!(document = document_id, error = %e, "embedding failed; falling back to lexical index");
                    for p in &mut passages {
                        p.embedding = None;
                    }
                    None
                }
            },
            None => {
                warn!(document = document_id, "no embedder configured; using lexical index");
                None
            }
        };

        let mode = if vector.is_some() { "vector" } else { "lexical" };
        info!(document = document_id, passages = passages.len(), mode, "built document index");
        Ok(Self { document_id: document_id.to_string(), passages, lexical, vector })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn passage(&self, id: PassageId) -> Option<&Passage> {
        self.passages.get(id).filter(|p| p.id == id).or_else(|| self.passages.iter().find(|p| p.id == id))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn is_lexical_only(&self) -> bool {
        self.vector.is_none()
    }

    pub fn mode(&self) -> SourceKind {
        if self.is_lexical_only() { SourceKind::Lexical } else { SourceKind::Vector }
    }

    /// Top `min(k, n)` hits, highest score first. Never pads.
    pub fn query(&self, text: &str, k: usize) -> Vec<SearchHit> {
        if let Some(v) = &self.vector {
            match embed_query(v.embedder.as_ref(), text).and_then(|q| v.index.search(&q, k)) {
                Ok(hits) => return hits,
                Err(e) => warn!(document = %self.document_id, error = %e, "query embedding failed; answering lexically"),
            }
        }
        self.lexical.search(text, k)
    }
}

fn build_vectors(
    passages: &mut [Passage],
    embedder: &dyn Embedder,
    cache: &EmbeddingCache,
    batch_size: usize,
    progress: &ProgressBar,
) -> AnyResult<VectorIndex> {
    let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
    let vectors = embed_texts(&texts, embedder, cache, batch_size, progress)?;
    let mut index = VectorIndex::new(embedder.dim());
    for (passage, vector) in passages.iter_mut().zip(vectors) {
        index.add(passage.id, &vector)?;
        passage.embedding = Some(vector);
    }
    Ok(index)
}

fn embed_query(embedder: &dyn Embedder, text: &str) -> AnyResult<Vec<f32>> {
    embedder
        .embed_batch(&[text.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("embedder returned no vector for query"))
}
