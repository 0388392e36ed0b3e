//! Text-generation and embedding backends for ctxkeeper.
//!
//! [`OpenAiCompatProvider`] implements `ctxkeeper_core::Provider` against any
//! OpenAI-compatible server (Ollama by default). [`ProviderEmbedder`] adapts
//! a provider's embedding endpoint to `ctxkeeper_core::Embedder`.

pub mod embedder;
pub mod openai_compat;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
