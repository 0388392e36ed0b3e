//! Test doubles for the retrieval crate.

use std::sync::atomic::{AtomicUsize, Ordering};

use ctxkeeper_core::Embedder;
use ctxkeeper_core::error::ProviderError;

/// Embeds text as keyword counts over a fixed vocabulary, plus a constant
/// bias so no vector is all zeros. Fails on any text containing `poison`.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            vocabulary: vec!["rust", "python", "cooking"],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len() + 1
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        if lower.contains("poison") {
            return Err(ProviderError::Network("embedding backend down".into()));
        }

        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}
