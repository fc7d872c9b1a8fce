use std::collections::HashSet;

use tracing::debug;

use studymate_core::config::RetrievalConfig;
use studymate_core::types::{OutlineKind, RetrievalResult, ScoredPassage};

use crate::index::DocumentIndex;

/// Selection policy applied on top of raw index hits: score threshold,
/// near-duplicate removal, a context character budget and the final K cut.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn top_k_for(&self, outline: Option<OutlineKind>) -> usize {
        match outline {
            None => self.config.top_k,
            Some(OutlineKind::SevenMark) => self.config.seven_mark_top_k,
            Some(OutlineKind::FourteenMark) => self.config.fourteen_mark_top_k,
        }
    }

    pub fn retrieve(&self, index: &DocumentIndex, query: &str, k: usize) -> RetrievalResult {
        // whole corpus, so near-duplicates cannot starve the result
        let candidates = index.query(query, index.len());
        let source = candidates.first().map_or(index.mode(), |h| h.source);
        let fetched = candidates.len();

        let mut kept: Vec<ScoredPassage> = Vec::new();
        let mut kept_words: Vec<HashSet<String>> = Vec::new();
        let mut used_chars = 0usize;

        for hit in candidates {
            if kept.len() >= k {
                break;
            }
            if hit.score <= self.config.min_score {
                break;
            }
            let Some(passage) = index.passage(hit.passage_id) else { continue };
            let words = word_set(&passage.text);
            if kept_words.iter().any(|w| jaccard(w, &words) >= self.config.dedup_similarity) {
                continue;
            }

            let len = passage.text.chars().count();
            let mut passage = passage.clone();
            if used_chars + len > self.config.max_context_chars {
                if kept.is_empty() {
                    passage.text = passage.text.chars().take(self.config.max_context_chars).collect();
                    kept.push(ScoredPassage { passage, score: hit.score });
                }
                break;
            }
            used_chars += len;
            kept.push(ScoredPassage { passage, score: hit.score });
            kept_words.push(words);
        }

        debug!(fetched, kept = kept.len(), k, ?source, "retrieved passages");
        RetrievalResult { passages: kept, source }
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_lowercase).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    inter as f32 / union as f32
}
