//! Exact in-memory vector search plus the embedding pipeline that feeds it.
//!
//! Passages are embedded in batches through a content-hash keyed cache
//! (`cache`), checked for count and dimension (`embed_batch`), and stored
//! row-major in a flat inner-product index (`flat`).
use indicatif::{ProgressBar, ProgressStyle};

pub mod cache;
pub mod embed_batch;
pub mod flat;

pub use cache::{hash_content, CacheEntry, EmbeddingCache};
pub use embed_batch::embed_texts;
pub use flat::VectorIndex;

/// Visible progress bar for interactive ingest.
pub fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
