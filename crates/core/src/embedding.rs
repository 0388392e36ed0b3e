//! Embedder trait: text to fixed-dimension vector.
//!
//! Implementations must fail closed: an error, never a partial or
//! wrongly-sized vector.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier used for embeddings.
    fn model(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}
