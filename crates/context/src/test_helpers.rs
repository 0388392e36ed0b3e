//! Shared test doubles for the context crate.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ctxkeeper_core::error::ProviderError;
use ctxkeeper_core::message::Message;
use ctxkeeper_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// A provider that answers every completion with the same text, or fails.
///
/// Records the number of calls and the last request it saw.
pub struct ScriptedProvider {
    reply: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.reply {
            Some(text) => Ok(ProviderResponse {
                message: Message::assistant(text.clone()),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: request.model,
            }),
            None => Err(ProviderError::Network("connection refused".into())),
        }
    }
}
