use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{Availability, BackendId, GenerationRequest};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model, used to key cached vectors.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Returns one L2-normalized vector of length `dim()` per input text.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Uniform capability set over heterogeneous answer-generation services.
#[async_trait]
pub trait Backend: Send + Sync {
    fn id(&self) -> &BackendId;

    /// Label shown next to the backend's answer.
    fn display_name(&self) -> &str;

    /// Local readiness check; must not perform network I/O.
    fn health(&self) -> Availability;

    /// Whether `generate` honours `GenerationRequest::restructure`.
    fn supports_restructure(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError>;
}
