use anyhow::{anyhow, Result};

use studymate_core::types::{rank_hits, PassageId, SearchHit, SourceKind};

/// Exact inner-product index over L2-normalized vectors, so scores are cosine similarities.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dim: usize,
    ids: Vec<PassageId>,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), data: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn add(&mut self, id: PassageId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(anyhow!("dim mismatch: got {} expected {}", vector.len(), self.dim));
        }
        self.ids.push(id);
        self.data.extend(normalized(vector));
        Ok(())
    }

    /// Top `min(k, len)` rows by cosine similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(anyhow!("query dim mismatch: got {} expected {}", query.len(), self.dim));
        }
        let q = normalized(query);
        let hits = self
            .ids
            .iter()
            .zip(self.data.chunks_exact(self.dim.max(1)))
            .map(|(&passage_id, row)| SearchHit {
                passage_id,
                score: row.iter().zip(&q).map(|(a, b)| a * b).sum(),
                source: SourceKind::Vector,
            })
            .collect();
        Ok(rank_hits(hits, k))
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 { v.iter().map(|x| x / norm).collect() } else { v.to_vec() }
}
