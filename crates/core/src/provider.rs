//! Provider trait: the abstraction over text-generation backends.
//!
//! A Provider knows how to send a message list to a language model and get a
//! response back, either as a complete message or as a stream of fragments
//! terminated by an explicit end-of-stream chunk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// One generation call: a model id, the planned message list and sampling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,

    /// Already planned and, if requested, augmented
    pub messages: Vec<Message>,

    /// Sampling temperature; summaries use a lower value than chat
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask for SSE fragments instead of one body
    #[serde(default)]
    pub stream: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stream: false,
            stop: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A whole reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub message: Message,

    pub usage: Option<Usage>,

    /// Model that answered, as reported by the server
    pub model: String,
}

/// Server-reported token usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One fragment of a streamed reply. The last fragment has `done` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Texts to embed with one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,

    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One vector per input, in input order
    pub embeddings: Vec<Vec<f32>>,

    pub model: String,

    pub usage: Option<Usage>,
}

/// Receiving end of a streamed reply.
pub type ChunkReceiver = tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// A text-generation backend.
///
/// The summarizer and the chat turn call `complete()` or `stream()`
/// without knowing which server is answering.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend name used in logs (e.g., "ollama").
    fn name(&self) -> &str;

    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Stream a reply fragment by fragment.
    ///
    /// The default calls `complete()` and sends the whole reply as one
    /// final chunk.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx.send(Ok(StreamChunk {
            content: Some(response.message.content),
            done: true,
            usage: response.usage,
        })).await;
        Ok(rx)
    }

    /// Embed a batch of texts. Unsupported unless overridden.
    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            format!("Provider '{}' does not support embeddings", self.name()),
        ))
    }

    /// Model ids the server can serve.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// `true` when the server answers.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("llama3.2:latest", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!req.stream);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn temperature_deserializes_with_default() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"phi3:latest","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
    }

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(last),
                usage: None,
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn default_stream_yields_single_final_chunk() {
        let mut rx = Echo
            .stream(ProviderRequest::new("m", vec![Message::user("ping")]))
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("ping"));
        assert!(chunk.done);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn default_embed_is_not_configured() {
        let err = Echo
            .embed(EmbeddingRequest { model: "e".into(), inputs: vec!["x".into()] })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
