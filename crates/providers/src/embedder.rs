//! Embeddings through a completion provider's `/embeddings` endpoint.

use async_trait::async_trait;
use gradwise_core::error::MemoryError;
use gradwise_core::memory::Embedder;
use gradwise_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An [`Embedder`] backed by a [`Provider`], bounded by a timeout.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            inputs: vec![text.to_string()],
        };

        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| {
                MemoryError::EmbeddingFailed(format!("timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MemoryError::EmbeddingFailed("empty embedding response".into()))?;

        debug!(provider = %self.provider.name(), dims = embedding.len(), "Embedded text");
        Ok(embedding)
    }
}
