//! studymate-text
//!
//! Keyword-overlap index over passages, sharing tantivy's analyzer chain
//! (simple tokenizer, lower-casing, stop words) for both passages and queries.
pub mod tantivy_utils;
pub mod index;

pub use index::LexicalIndex;
pub use tantivy_utils::{analyze, build_analyzer};
