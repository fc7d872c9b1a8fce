use std::collections::{BTreeSet, HashMap};

use tantivy::tokenizer::TextAnalyzer;
use tracing::debug;

use studymate_core::types::{rank_hits, Passage, PassageId, SearchHit, SourceKind};

use crate::tantivy_utils::{analyze, build_analyzer};

/// In-memory term postings for one document's passages.
///
/// Score of a passage = distinct query terms it contains / distinct query terms.
pub struct LexicalIndex {
	analyzer: TextAnalyzer,
	postings: HashMap<String, Vec<(PassageId, u32)>>,
	passage_ids: Vec<PassageId>,
}

impl LexicalIndex {
	pub fn build(passages: &[Passage]) -> Self {
		let mut analyzer = build_analyzer();
		let mut postings: HashMap<String, Vec<(PassageId, u32)>> = HashMap::new();
		for passage in passages {
			let mut freqs: HashMap<String, u32> = HashMap::new();
			for term in analyze(&mut analyzer, &passage.text) {
				*freqs.entry(term).or_default() += 1;
			}
			for (term, tf) in freqs {
				postings.entry(term).or_default().push((passage.id, tf));
			}
		}
		debug!(passages = passages.len(), terms = postings.len(), "built lexical postings");
		Self { analyzer, postings, passage_ids: passages.iter().map(|p| p.id).collect() }
	}

	pub fn len(&self) -> usize {
		self.passage_ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.passage_ids.is_empty()
	}

	pub fn term_frequency(&self, term: &str, passage_id: PassageId) -> u32 {
		self.postings
			.get(term)
			.and_then(|p| p.iter().find(|(id, _)| *id == passage_id))
			.map_or(0, |(_, tf)| *tf)
	}

	/// Score every passage and return the best `min(k, n)`.
	pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
		let mut analyzer = self.analyzer.clone();
		let terms: BTreeSet<String> = analyze(&mut analyzer, query).into_iter().collect();

		let mut matched: HashMap<PassageId, usize> = HashMap::new();
		for term in &terms {
			if let Some(list) = self.postings.get(term) {
				for (id, _) in list {
					*matched.entry(*id).or_default() += 1;
				}
			}
		}

		let denom = terms.len().max(1) as f32;
		let hits = self
			.passage_ids
			.iter()
			.map(|id| SearchHit {
				passage_id: *id,
				score: matched.get(id).copied().unwrap_or(0) as f32 / denom,
				source: SourceKind::Lexical,
			})
			.collect();
		rank_hits(hits, k)
	}
}
