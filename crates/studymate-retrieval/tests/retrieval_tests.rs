use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use studymate_core::chunker::Chunker;
use studymate_core::config::RetrievalConfig;
use studymate_core::error::Error;
use studymate_core::traits::Embedder;
use studymate_core::types::{Document, Passage, SourceKind};
use studymate_embed::HashEmbedder;
use studymate_retrieval::{DocumentIndex, Retriever};
use studymate_vector::EmbeddingCache;

/// Succeeds for the first `ok_calls` batches, then fails.
struct FlakyEmbedder {
    inner: HashEmbedder,
    ok_calls: usize,
    calls: AtomicUsize,
}

impl Embedder for FlakyEmbedder {
    fn embedder_id(&self) -> &str { "flaky" }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { 64 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
            anyhow::bail!("model crashed");
        }
        self.inner.embed_batch(texts)
    }
}

fn photosynthesis() -> Vec<Passage> {
    let doc = Document::new("bio", vec!["Photosynthesis converts light into energy.".into(), "Plants use chlorophyll.".into()]);
    Chunker::default().chunk(&doc)
}

fn build(passages: Vec<Passage>, embedder: Option<Arc<dyn Embedder>>) -> DocumentIndex {
    DocumentIndex::build("doc", passages, embedder, &EmbeddingCache::new(), 8, &ProgressBar::hidden()).expect("build")
}

fn passages(texts: &[&str]) -> Vec<Passage> {
    texts.iter().enumerate().map(|(id, t)| Passage { id, text: t.to_string(), source_page: 0, embedding: None }).collect()
}

#[test]
fn photosynthesis_scenario_vector_mode() {
    let index = build(photosynthesis(), Some(Arc::new(HashEmbedder::new(384))));
    assert!(!index.is_lexical_only());
    assert!(index.passages().iter().all(|p| p.embedding.is_some()));

    let result = Retriever::default().retrieve(&index, "What converts light to energy?", 5);
    assert_eq!(result.source, SourceKind::Vector);
    assert!(!result.is_empty());
    assert_eq!(result.passages[0].passage.text, "Photosynthesis converts light into energy.");
    assert!(result.passages[0].score > 0.1);
}

#[test]
fn photosynthesis_scenario_lexical_mode() {
    let index = build(photosynthesis(), None);
    assert!(index.is_lexical_only());
    let result = Retriever::default().retrieve(&index, "What converts light to energy?", 5);
    assert_eq!(result.source, SourceKind::Lexical);
    assert_eq!(result.len(), 1, "unrelated passage is below the threshold");
    assert_eq!(result.passages[0].passage.id, 0);
}

#[test]
fn empty_passage_list_is_rejected() {
    let err = DocumentIndex::build("doc", Vec::new(), None, &EmbeddingCache::new(), 8, &ProgressBar::hidden()).err();
    assert!(matches!(err, Some(Error::EmptyDocument)));
}

#[test]
fn failed_build_embedding_falls_back_to_lexical() {
    let embedder = FlakyEmbedder { inner: HashEmbedder::new(32), ok_calls: 0, calls: AtomicUsize::new(0) };
    let index = build(photosynthesis(), Some(Arc::new(embedder)));
    assert!(index.is_lexical_only());
    assert!(index.passages().iter().all(|p| p.embedding.is_none()));
    let result = Retriever::default().retrieve(&index, "chlorophyll", 2);
    assert_eq!(result.passages[0].passage.id, 1);
}

#[test]
fn failed_query_embedding_answers_lexically() {
    // one call for the build batch, then every query embedding fails
    let embedder = FlakyEmbedder { inner: HashEmbedder::new(32), ok_calls: 1, calls: AtomicUsize::new(0) };
    let index = build(photosynthesis(), Some(Arc::new(embedder)));
    assert!(!index.is_lexical_only());
    let result = Retriever::default().retrieve(&index, "chlorophyll plants", 2);
    assert_eq!(result.source, SourceKind::Lexical);
    assert_eq!(result.passages[0].passage.id, 1);
}

#[test]
fn results_are_unique_bounded_and_descending() {
    let corpus = passages(&[
        "energy flows through food chains",
        "energy flows through food chains",
        "solar energy powers plants",
        "energy is conserved",
        "rocks are heavy",
    ]);
    let index = build(corpus, Some(Arc::new(HashEmbedder::new(256))));
    let result = Retriever::default().retrieve(&index, "energy", 10);

    assert!(result.len() <= index.len());
    let ids: HashSet<_> = result.passages.iter().map(|p| p.passage.id).collect();
    assert_eq!(ids.len(), result.len());
    assert!(!(ids.contains(&0) && ids.contains(&1)), "near-duplicates are collapsed");
    for pair in result.passages.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.score > b.score || (a.score == b.score && a.passage.id < b.passage.id));
    }
}

#[test]
fn context_budget_truncates_oversized_first_passage() {
    let long = "energy ".repeat(100);
    let index = build(passages(&[long.trim(), "energy again"]), None);
    let retriever = Retriever::new(RetrievalConfig { max_context_chars: 50, ..RetrievalConfig::default() });
    let result = retriever.retrieve(&index, "energy", 5);
    assert_eq!(result.len(), 1);
    assert_eq!(result.passages[0].passage.text.chars().count(), 50);
}

#[test]
fn context_budget_stops_at_first_overflow() {
    let index = build(passages(&["energy one", "energy two words here", "energy three"]), None);
    let retriever = Retriever::new(RetrievalConfig { max_context_chars: 25, ..RetrievalConfig::default() });
    let result = retriever.retrieve(&index, "energy", 5);
    let ids: Vec<_> = result.passages.iter().map(|p| p.passage.id).collect();
    assert_eq!(ids, vec![0]);
}

#[test]
fn unrelated_query_yields_empty_result() {
    let index = build(photosynthesis(), None);
    let result = Retriever::default().retrieve(&index, "volcanoes", 3);
    assert!(result.is_empty());
}

#[test]
fn duplicates_do_not_hide_lower_ranked_distinct_passages() {
    let mut texts = vec!["energy flows"; 6];
    texts.push("energy flows through chains of food webs");
    let index = build(passages(&texts), None);

    let result = Retriever::default().retrieve(&index, "energy flows", 2);
    let ids: Vec<_> = result.passages.iter().map(|p| p.passage.id).collect();
    assert_eq!(ids, vec![0, 6]);
}
