use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use tracing::debug;

use studymate_core::traits::Embedder;

use crate::cache::{hash_content, CacheEntry, EmbeddingCache};

/// Embed `texts` in batches of `batch_size`, consulting `cache` first and writing
/// misses through. Returns one vector per input, in input order.
pub fn embed_texts(
    texts: &[String],
    embedder: &dyn Embedder,
    cache: &EmbeddingCache,
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    let mut hits = 0usize;
    progress.set_length(texts.len() as u64);

    for chunk in texts.chunks(batch_size.max(1)) {
        let hashes: Vec<String> = chunk.iter().map(|t| hash_content(t)).collect();
        let cached = cache.get_many(embedder.embedder_id(), &hashes)?;

        let mut vectors: Vec<Option<Vec<f32>>> = hashes.iter().map(|h| cached.get(h).cloned()).collect();
        hits += vectors.iter().filter(|v| v.is_some()).count();
        let miss_indices: Vec<usize> = (0..chunk.len()).filter(|&i| vectors[i].is_none()).collect();

        if !miss_indices.is_empty() {
            let miss_texts: Vec<String> = miss_indices.iter().map(|&i| chunk[i].clone()).collect();
            let embs = embedder.embed_batch(&miss_texts)?;
            if embs.len() != miss_texts.len() {
                return Err(anyhow!("embedder returned wrong count: got {} expected {}", embs.len(), miss_texts.len()));
            }
            let mut new_entries = Vec::with_capacity(embs.len());
            for (&i, v) in miss_indices.iter().zip(embs) {
                if v.len() != embedder.dim() {
                    return Err(anyhow!("dim mismatch: got {} expected {}", v.len(), embedder.dim()));
                }
                new_entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder.embedder_id().to_string(), vector: v.clone() });
                vectors[i] = Some(v);
            }
            cache.put_many(new_entries)?;
        }

        for v in vectors {
            out.push(v.ok_or_else(|| anyhow!("missing embedding after batch"))?);
        }
        progress.inc(chunk.len() as u64);
    }
    progress.finish_and_clear();
    debug!(total = texts.len(), cache_hits = hits, embedder = embedder.embedder_id(), "embedded passages");
    Ok(out)
}
