//! Persistence traits.
//!
//! One trait per aggregate so components only depend on what they touch:
//! the budget planner needs history and summaries, the retrieval service
//! needs documents and the vector index. Backends (in-memory, SQLite,
//! PostgreSQL) usually implement all four on a single struct.
//!
//! Deleting a conversation cascades to its messages, documents, chunks and
//! summaries. Deleting a document cascades to its chunks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::document::{ConversationSummary, Document, DocumentChunk, DocumentId, ScoredChunk};
use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, Message};

type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    async fn create_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>>;

    /// All conversations, most recently updated first.
    async fn list_conversations(&self) -> StoreResult<Vec<Conversation>>;

    /// Returns `false` when the conversation did not exist.
    async fn delete_conversation(&self, id: &ConversationId) -> StoreResult<bool>;

    /// Append a message. Fails with `MissingParent` for an unknown conversation.
    async fn append_message(&self, id: &ConversationId, message: &Message) -> StoreResult<()>;

    /// Full history ordered by timestamp, ties by insertion order.
    async fn load_history(&self, id: &ConversationId) -> StoreResult<Vec<Message>>;

    /// Set the conversation's `updated_at` to `now`.
    async fn touch(&self, id: &ConversationId, now: DateTime<Utc>) -> StoreResult<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with `MissingParent` for an unknown conversation.
    async fn insert_document(&self, document: &Document) -> StoreResult<()>;

    /// Fails with `MissingParent` for an unknown document.
    async fn insert_chunk(&self, chunk: &DocumentChunk) -> StoreResult<()>;

    async fn get_document(&self, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Documents of one conversation, oldest upload first.
    async fn list_documents(&self, conversation: &ConversationId) -> StoreResult<Vec<Document>>;

    /// Returns `false` when the document did not exist.
    async fn delete_document(&self, id: &DocumentId) -> StoreResult<bool>;

    async fn chunk_count(&self, id: &DocumentId) -> StoreResult<usize>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// The most recently created summary for a conversation.
    async fn latest_summary(&self, id: &ConversationId) -> StoreResult<Option<ConversationSummary>>;

    /// Persist a summary unless it covers fewer messages than the current
    /// latest one. Returns `false` when the write was rejected.
    async fn save_summary(&self, summary: &ConversationSummary) -> StoreResult<bool>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The `k` chunks most similar to `query` among those owned by the
    /// documents in `scope`, best first. Equal scores keep insertion order.
    async fn nearest_k(
        &self,
        query: &[f32],
        scope: &[DocumentId],
        k: usize,
    ) -> StoreResult<Vec<ScoredChunk>>;
}
