//! One chat turn: persist, plan, retrieve, stream, persist.

use chrono::Utc;
use ctxkeeper_core::{ConversationId, Error, Message, ProviderRequest, Result};
use ctxkeeper_retrieval::augment_prompt;
use tracing::{debug, info};

use crate::app::App;

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub conversation: ConversationId,
    pub message: String,
    pub model: String,
    pub use_rag: bool,
    /// Base64 payloads or data URLs attached to the user message
    pub images: Vec<String>,
}

impl ChatTurn {
    pub fn new(conversation: ConversationId, message: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            conversation,
            message: message.into(),
            model: model.into(),
            use_rag: false,
            images: Vec::new(),
        }
    }

    pub fn with_rag(mut self, use_rag: bool) -> Self {
        self.use_rag = use_rag;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Outcome of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub reply: String,
    pub was_compacted: bool,
    pub used_rag: bool,
    /// Planned history cost before retrieval augmentation
    pub context_tokens: usize,
}

impl App {
    /// Run one turn of `turn.conversation`, passing each streamed fragment
    /// of the reply to `on_fragment` as it arrives.
    ///
    /// The user message is stored before planning. The assistant message is
    /// stored only once the stream has ended; a generation failure leaves
    /// the user message as the last one in the history.
    pub async fn chat_turn<F>(&self, turn: ChatTurn, mut on_fragment: F) -> Result<TurnReport>
    where
        F: FnMut(&str),
    {
        let conversation = &turn.conversation;
        self.require_conversation(conversation).await?;

        let user = Message::user(turn.message.clone()).with_images(turn.images.clone());
        self.stores.conversations.append_message(conversation, &user).await?;

        let planned = self.planner.get_context(conversation, &turn.model).await?;
        let was_compacted = planned.was_compacted();
        let context_tokens = planned.token_count;
        let mut messages = planned.messages;

        let mut used_rag = false;
        if turn.use_rag {
            let outcome = self
                .retrieval
                .search(conversation, &turn.message, self.retrieval.top_k())
                .await;
            if outcome.is_hits() {
                used_rag = true;
                let augmented = augment_prompt(&turn.message, outcome.hits());
                match messages.last_mut().filter(|m| m.id == user.id) {
                    Some(current) => current.content = augmented,
                    None => messages.push(Message::user(augmented).with_images(turn.images.clone())),
                }
            }
        }

        debug!(
            conversation = %conversation,
            messages = messages.len(),
            context_tokens,
            was_compacted,
            used_rag,
            "Sending turn"
        );

        let mut request = ProviderRequest::new(turn.model.clone(), messages)
            .with_temperature(self.config.default_temperature);
        request.stream = true;

        let mut rx = self
            .provider
            .stream(request)
            .await
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?;

        let mut reply = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.map_err(|e| Error::GenerationUnavailable(e.to_string()))?;
            if let Some(text) = chunk.content.as_deref().filter(|t| !t.is_empty()) {
                on_fragment(text);
                reply.push_str(text);
            }
            if chunk.done {
                break;
            }
        }

        let assistant = Message::assistant(reply.clone()).with_model(turn.model.clone());
        self.stores.conversations.append_message(conversation, &assistant).await?;
        self.stores.conversations.touch(conversation, Utc::now()).await?;

        info!(
            conversation = %conversation,
            model = %turn.model,
            reply_chars = reply.len(),
            was_compacted,
            used_rag,
            "Turn complete"
        );

        Ok(TurnReport {
            reply,
            was_compacted,
            used_rag,
            context_tokens,
        })
    }
}
