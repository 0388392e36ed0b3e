//! OpenAI-compatible provider implementation.
//!
//! Targets Ollama's `/v1` endpoint by default, but works with any server
//! exposing `/chat/completions`, `/embeddings` and `/models`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Image attachments as `image_url` content parts
//! - Embeddings, model listing and health checks

use async_trait::async_trait;
use futures::StreamExt;
use ctxkeeper_config::ProviderConfig;
use ctxkeeper_core::error::ProviderError;
use ctxkeeper_core::message::{Message, Role};
use ctxkeeper_core::provider::*;
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> std::result::Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> std::result::Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            std::time::Duration::from_secs(120),
        )
    }

    /// Build from the `[provider]` config section.
    pub fn from_config(config: &ProviderConfig) -> std::result::Result<Self, ProviderError> {
        Self::new(
            config.kind.clone(),
            config.api_url.clone(),
            config.api_key.clone().unwrap_or_else(|| "ollama".into()),
            std::time::Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    ///
    /// Messages with attached images become a content-part array so the
    /// images travel as `data:` URLs alongside the text.
    fn to_api_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let content = if m.images.is_empty() {
                    serde_json::json!(m.content)
                } else {
                    let mut parts = vec![serde_json::json!({ "type": "text", "text": m.content })];
                    parts.extend(m.images.iter().map(|img| {
                        serde_json::json!({
                            "type": "image_url",
                            "image_url": { "url": as_data_url(img) },
                        })
                    }));
                    serde_json::Value::Array(parts)
                };
                serde_json::json!({ "role": m.role.as_str(), "content": content })
            })
            .collect()
    }

    fn chat_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        accept_sse: bool,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if accept_sse {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        check_status(response).await
    }
}

/// Map non-success HTTP statuses onto provider errors.
async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    match status {
        200 => Ok(response),
        429 => Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        }),
        401 | 403 => Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        )),
        404 => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::ModelNotFound(body))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Provider returned error");
            Err(ProviderError::ApiError {
                status_code: status,
                message: body,
            })
        }
    }
}

/// Images are stored as bare base64; the API wants a data URL.
fn as_data_url(image: &str) -> String {
    if image.starts_with("data:") {
        image.to_string()
    } else {
        format!("data:image/png;base64,{image}")
    }
}

#[async_trait]
impl ctxkeeper_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let body = Self::chat_body(&request, false);
        let response = self.post("/chat/completions", &body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let message = Message::assistant(choice.message.content.unwrap_or_default())
            .with_model(api_response.model.clone());

        Ok(ProviderResponse {
            message,
            usage: api_response.usage.map(Usage::from),
            model: api_response.model,
        })
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: ModelList = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(body.data.into_iter().map(|m| m.id).collect())
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });
        let response = self.post("/embeddings", &body, false).await?;

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        Ok(EmbeddingResponse {
            embeddings: api_resp.data.into_iter().map(|d| d.embedding).collect(),
            model: api_resp.model,
            usage: api_resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: 0,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let body = Self::chat_body(&request, true);
        let response = self.post("/chat/completions", &body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream on a task; the receiver sees content
        // deltas followed by exactly one `done` chunk.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in parser.push(&bytes) {
                    match event {
                        SseEvent::Chunk(chunk) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                        SseEvent::Unparseable { data, error } => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %error,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

// --- SSE line handling ---

#[derive(Debug)]
enum SseEvent {
    Chunk(StreamChunk),
    Unparseable { data: String, error: String },
}

/// Incremental parser for `data: {...}` lines. Network reads may split
/// lines, and characters, at any byte; raw bytes are buffered and only
/// complete lines are decoded.
#[derive(Debug, Default)]
struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                events.push(SseEvent::Chunk(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }));
                continue;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    if let Some(choice) = resp.choices.first() {
                        let has_content = choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());
                        if has_content {
                            events.push(SseEvent::Chunk(StreamChunk {
                                content: choice.delta.content.clone(),
                                done: false,
                                usage: None,
                            }));
                        }
                    }

                    // With stream_options the usage frame is the last one
                    if let Some(usage) = resp.usage {
                        events.push(SseEvent::Chunk(StreamChunk {
                            content: None,
                            done: true,
                            usage: Some(usage.into()),
                        }));
                    }
                }
                Err(e) => events.push(SseEvent::Unparseable {
                    data: data.to_string(),
                    error: e.to_string(),
                }),
            }
        }

        events
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<EmbeddingApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
