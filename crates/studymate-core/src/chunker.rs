use tracing::debug;

use crate::config::ChunkingConfig;
use crate::types::{Document, Passage};

/// Splits page text into bounded, overlapping passages of whole sentences.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk every page in order. Passage ids are dense from 0 across the whole document.
    pub fn chunk(&self, document: &Document) -> Vec<Passage> {
        let mut passages = Vec::new();
        for (page_index, page) in document.pages.iter().enumerate() {
            for text in self.chunk_page(page) {
                if non_whitespace_len(&text) < self.config.min_chars {
                    continue;
                }
                passages.push(Passage { id: passages.len(), text, source_page: page_index, embedding: None });
            }
        }
        let tokens: usize = passages.iter().map(|p| estimate_tokens(&p.text)).sum();
        debug!(document = %document.id, pages = document.pages.len(), passages = passages.len(), tokens, "chunked document");
        passages
    }

    fn chunk_page(&self, page: &str) -> Vec<String> {
        let max = self.config.max_chars.max(1);
        let units: Vec<String> = split_sentences(page).into_iter().flat_map(|s| bound_unit(&s, max)).collect();

        let mut out = Vec::new();
        let mut current: Vec<String> = Vec::new();
        // true once `current` holds a unit that has not been emitted yet
        let mut fresh = false;

        for unit in units {
            if !current.is_empty() && joined_len(&current) + 1 + char_len(&unit) > max {
                if fresh {
                    out.push(current.join(" "));
                    let keep = self.config.overlap_units.min(current.len());
                    let emitted = current.len() - keep;
                    current.drain(..emitted);
                }
                while !current.is_empty() && joined_len(&current) + 1 + char_len(&unit) > max {
                    current.remove(0);
                }
            }
            current.push(unit);
            fresh = true;
        }
        if fresh {
            out.push(current.join(" "));
        }
        out
    }
}

/// Segment text into sentence-like units at `.`, `!` and `?`.
///
/// Whitespace is collapsed to single spaces and terminator runs such as `?!` or `...`
/// stay attached to the sentence they end.
pub fn split_sentences(text: &str) -> Vec<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = collapsed.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if is_terminator(c) && !chars.peek().copied().is_some_and(is_terminator) {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Rough token count used for logging passage budgets.
pub fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn non_whitespace_len(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

fn joined_len(units: &[String]) -> usize {
    units.iter().map(|u| char_len(u)).sum::<usize>() + units.len().saturating_sub(1)
}

/// Break a unit that exceeds `max` chars at word boundaries, then at char boundaries.
fn bound_unit(unit: &str, max: usize) -> Vec<String> {
    if char_len(unit) <= max {
        return vec![unit.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in unit.split_whitespace() {
        let words: Vec<String> = if char_len(word) > max {
            let chars: Vec<char> = word.chars().collect();
            chars.chunks(max).map(|c| c.iter().collect()).collect()
        } else {
            vec![word.to_string()]
        };
        for w in words {
            if !current.is_empty() && char_len(&current) + 1 + char_len(&w) > max {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&w);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
