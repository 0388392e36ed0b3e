//! Adapter exposing a provider's embedding endpoint as an [`Embedder`].

use std::sync::Arc;

use async_trait::async_trait;
use ctxkeeper_core::error::ProviderError;
use ctxkeeper_core::provider::EmbeddingRequest;
use ctxkeeper_core::{Embedder, Provider};
use tracing::debug;

/// Embeds one text per request and rejects vectors of the wrong size.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await?;

        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        if vector.len() != self.dimension {
            return Err(ProviderError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        debug!(model = %self.model, chars = text.len(), "Embedded text");
        Ok(vector)
    }
}
