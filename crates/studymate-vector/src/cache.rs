//! Embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling the embedder and written through on misses, so
//! re-ingesting a document does not embed unchanged passages again.
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<(String, String), Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> Result<HashMap<String, Vec<f32>>> {
        let entries = self.entries.read().map_err(|_| anyhow!("embedding cache lock poisoned"))?;
        let mut out = HashMap::new();
        for h in hashes {
            if let Some(v) = entries.get(&(h.clone(), embedder_id.to_string())) {
                out.insert(h.clone(), v.clone());
            }
        }
        Ok(out)
    }

    pub fn put_many(&self, new_entries: Vec<CacheEntry>) -> Result<()> {
        if new_entries.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write().map_err(|_| anyhow!("embedding cache lock poisoned"))?;
        for e in new_entries {
            entries.insert((e.content_hash, e.embedder_id), e.vector);
        }
        Ok(())
    }

    /// Drop every entry whose content hash is not in `keep`.
    pub fn retain_content(&self, keep: &HashSet<String>) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| anyhow!("embedding cache lock poisoned"))?;
        entries.retain(|(hash, _), _| keep.contains(hash));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_scoped_by_embedder() {
        let cache = EmbeddingCache::new();
        let h = hash_content("text");
        cache.put_many(vec![CacheEntry { content_hash: h.clone(), embedder_id: "a".into(), vector: vec![1.0] }]).unwrap();
        assert_eq!(cache.get_many("a", &[h.clone()]).unwrap().len(), 1);
        assert!(cache.get_many("b", &[h]).unwrap().is_empty());
    }

    #[test]
    fn retain_keeps_only_listed_content() {
        let cache = EmbeddingCache::new();
        let (old, live) = (hash_content("old page"), hash_content("live page"));
        cache
            .put_many(vec![
                CacheEntry { content_hash: old.clone(), embedder_id: "a".into(), vector: vec![1.0] },
                CacheEntry { content_hash: live.clone(), embedder_id: "a".into(), vector: vec![2.0] },
            ])
            .unwrap();
        cache.retain_content(&HashSet::from([live.clone()])).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get_many("a", &[old]).unwrap().is_empty());
        assert_eq!(cache.get_many("a", &[live]).unwrap().len(), 1);
    }
}
