//! Ingested documents, their embedded chunks, and compaction summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::ConversationId;

/// Unique identifier for an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document uploaded into a conversation. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,

    /// Owning conversation; retrieval never crosses this boundary
    pub conversation_id: ConversationId,

    /// Original filename as uploaded
    pub filename: String,

    /// Normalized type tag: `txt`, `md`, `pdf`, or `docx`
    pub file_type: String,

    /// Full extracted text
    pub content: String,

    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        conversation_id: ConversationId,
        filename: impl Into<String>,
        file_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            conversation_id,
            filename: filename.into(),
            file_type: file_type.into(),
            content: content.into(),
            uploaded_at: Utc::now(),
        }
    }
}

/// One embedded segment of a document.
///
/// `chunk_index` values of a document's persisted chunks are contiguous
/// from zero, in chunker order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub text: String,

    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub text: String,

    /// Cosine similarity to the query vector, in [-1, 1]
    pub score: f32,
}

/// The persisted result of one compaction.
///
/// Covers the oldest `messages_summarized` messages of the conversation in
/// timestamp order. The most recently created row is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub summary_text: String,
    pub messages_summarized: usize,
    pub created_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(
        conversation_id: ConversationId,
        summary_text: impl Into<String>,
        messages_summarized: usize,
    ) -> Self {
        Self {
            conversation_id,
            summary_text: summary_text.into(),
            messages_summarized,
            created_at: Utc::now(),
        }
    }
}
