use std::hash::Hasher;

use anyhow::Result;
use twox_hash::XxHash64;

use studymate_core::traits::Embedder;

/// Deterministic feature-hashing embedder. Needs no model files, so it backs tests
/// and machines without a downloaded checkpoint.
///
/// Each lower-cased alphanumeric token adds ±1 to one bucket; the result is
/// L2-normalized. Text with no tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { id: format!("hash:{dim}"), dim }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += if h >> 63 == 0 { 1.0 } else { -1.0 };
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_vector() {
        let v = HashEmbedder::new(8).embed_one("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed_one("Light, Energy!"), e.embed_one("light energy"));
    }
}
