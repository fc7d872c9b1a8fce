pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod tokenize;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use studymate_core::config::{expand_path, EmbeddingConfig, EmbeddingProvider};
use studymate_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;

/// Build the embedder selected by configuration. `Ok(None)` means lexical-only retrieval.
pub fn load_embedder(cfg: &EmbeddingConfig) -> Result<Option<Arc<dyn Embedder>>> {
    match cfg.provider {
        EmbeddingProvider::Disabled => {
            info!("embeddings disabled; retrieval will be lexical");
            Ok(None)
        }
        EmbeddingProvider::Hash => Ok(Some(Arc::new(HashEmbedder::new(cfg.hash_dim)))),
        EmbeddingProvider::Model => {
            let dir = expand_path(&cfg.model_dir);
            let model = BertEmbedder::load(&dir, cfg.max_len)?;
            Ok(Some(Arc::new(model)))
        }
    }
}
