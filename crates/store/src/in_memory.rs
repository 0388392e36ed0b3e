//! In-memory backend: useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ctxkeeper_core::error::StoreError;
use ctxkeeper_core::{
    Conversation, ConversationId, ConversationStore, ConversationSummary, Document,
    DocumentChunk, DocumentId, DocumentStore, Message, ScoredChunk, SummaryStore, VectorIndex,
};
use tokio::sync::RwLock;

use crate::vector;

#[derive(Default)]
struct State {
    conversations: Vec<Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    documents: Vec<Document>,
    /// All chunks across documents, in insertion order
    chunks: Vec<DocumentChunk>,
    summaries: HashMap<ConversationId, Vec<ConversationSummary>>,
}

impl State {
    fn has_conversation(&self, id: &ConversationId) -> bool {
        self.conversations.iter().any(|c| &c.id == id)
    }

    fn remove_document(&mut self, id: &DocumentId) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| &d.id != id);
        self.chunks.retain(|c| &c.document_id != id);
        self.documents.len() != before
    }
}

/// Stores everything in process memory behind a single lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.has_conversation(&conversation.id) {
            return Err(StoreError::Storage(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        state.conversations.push(conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.conversations.iter().find(|c| &c.id == id).cloned())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut all = self.state.read().await.conversations.clone();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if !state.has_conversation(id) {
            return Ok(false);
        }
        state.conversations.retain(|c| &c.id != id);
        state.messages.remove(id);
        state.summaries.remove(id);
        let owned: Vec<DocumentId> = state
            .documents
            .iter()
            .filter(|d| &d.conversation_id == id)
            .map(|d| d.id.clone())
            .collect();
        for doc in &owned {
            state.remove_document(doc);
        }
        Ok(true)
    }

    async fn append_message(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.has_conversation(id) {
            return Err(StoreError::MissingParent { kind: "Conversation", id: id.to_string() });
        }
        state.messages.entry(id.clone()).or_default().push(message.clone());
        Ok(())
    }

    async fn load_history(&self, id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        let mut history = state.messages.get(id).cloned().unwrap_or_default();
        // Stable: equal timestamps keep append order
        history.sort_by_key(|m| m.timestamp);
        Ok(history)
    }

    async fn touch(&self, id: &ConversationId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.conversations.iter_mut().find(|c| &c.id == id) {
            Some(conv) => {
                conv.updated_at = now;
                Ok(())
            }
            None => Err(StoreError::MissingParent { kind: "Conversation", id: id.to_string() }),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.has_conversation(&document.conversation_id) {
            return Err(StoreError::MissingParent {
                kind: "Conversation",
                id: document.conversation_id.to_string(),
            });
        }
        state.documents.push(document.clone());
        Ok(())
    }

    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.documents.iter().any(|d| d.id == chunk.document_id) {
            return Err(StoreError::MissingParent {
                kind: "Document",
                id: chunk.document_id.to_string(),
            });
        }
        if state
            .chunks
            .iter()
            .any(|c| c.document_id == chunk.document_id && c.chunk_index == chunk.chunk_index)
        {
            return Err(StoreError::Storage(format!(
                "chunk {} of document {} already exists",
                chunk.chunk_index, chunk.document_id
            )));
        }
        state.chunks.push(chunk.clone());
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state.documents.iter().find(|d| &d.id == id).cloned())
    }

    async fn list_documents(&self, conversation: &ConversationId) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .filter(|d| &d.conversation_id == conversation)
            .cloned()
            .collect())
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool, StoreError> {
        Ok(self.state.write().await.remove_document(id))
    }

    async fn chunk_count(&self, id: &DocumentId) -> Result<usize, StoreError> {
        let state = self.state.read().await;
        Ok(state.chunks.iter().filter(|c| &c.document_id == id).count())
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn latest_summary(&self, id: &ConversationId) -> Result<Option<ConversationSummary>, StoreError> {
        let state = self.state.read().await;
        Ok(state.summaries.get(id).and_then(|rows| rows.last()).cloned())
    }

    async fn save_summary(&self, summary: &ConversationSummary) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if !state.has_conversation(&summary.conversation_id) {
            return Err(StoreError::MissingParent {
                kind: "Conversation",
                id: summary.conversation_id.to_string(),
            });
        }
        let rows = state.summaries.entry(summary.conversation_id.clone()).or_default();
        if rows
            .last()
            .is_some_and(|latest| latest.messages_summarized > summary.messages_summarized)
        {
            return Ok(false);
        }
        rows.push(summary.clone());
        Ok(true)
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn nearest_k(
        &self,
        query: &[f32],
        scope: &[DocumentId],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let state = self.state.read().await;
        let candidates = state.chunks.iter().filter(|c| scope.contains(&c.document_id));
        Ok(vector::rank_chunks(candidates, query, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_conversation() -> (InMemoryStore, ConversationId) {
        let store = InMemoryStore::new();
        let conv = Conversation::new();
        store.create_conversation(&conv).await.unwrap();
        (store, conv.id)
    }

    fn chunk(doc: &DocumentId, index: usize, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            document_id: doc.clone(),
            chunk_index: index,
            text: format!("chunk {index}"),
            embedding,
        }
    }

    #[tokio::test]
    async fn history_is_ordered_by_timestamp_then_insertion() {
        let (store, id) = store_with_conversation().await;
        let t0 = Utc::now();
        let later = Message::user("later").at(t0 + chrono::Duration::seconds(5));
        store.append_message(&id, &later).await.unwrap();
        store.append_message(&id, &Message::user("first").at(t0)).await.unwrap();
        store.append_message(&id, &Message::user("second").at(t0)).await.unwrap();

        let history = store.load_history(&id).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "later"]);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = InMemoryStore::new();
        let err = store
            .append_message(&ConversationId::from("nope"), &Message::user("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingParent { .. }));
    }

    #[tokio::test]
    async fn summary_writes_are_monotonic() {
        let (store, id) = store_with_conversation().await;
        assert!(store.save_summary(&ConversationSummary::new(id.clone(), "s6", 6)).await.unwrap());
        assert!(!store.save_summary(&ConversationSummary::new(id.clone(), "s4", 4)).await.unwrap());
        assert!(store.save_summary(&ConversationSummary::new(id.clone(), "s6b", 6)).await.unwrap());

        let latest = store.latest_summary(&id).await.unwrap().unwrap();
        assert_eq!(latest.summary_text, "s6b");
    }

    #[tokio::test]
    async fn delete_conversation_cascades() {
        let (store, id) = store_with_conversation().await;
        let doc = Document::new(id.clone(), "a.txt", "txt", "hello");
        store.insert_document(&doc).await.unwrap();
        store.insert_chunk(&chunk(&doc.id, 0, vec![1.0])).await.unwrap();
        store.append_message(&id, &Message::user("hi")).await.unwrap();
        store.save_summary(&ConversationSummary::new(id.clone(), "s", 1)).await.unwrap();

        assert!(store.delete_conversation(&id).await.unwrap());
        assert!(store.get_document(&doc.id).await.unwrap().is_none());
        assert_eq!(store.chunk_count(&doc.id).await.unwrap(), 0);
        assert!(store.load_history(&id).await.unwrap().is_empty());
        assert!(store.latest_summary(&id).await.unwrap().is_none());
        assert!(!store.delete_conversation(&id).await.unwrap());
    }

    #[tokio::test]
    async fn nearest_k_respects_scope() {
        let (store, id) = store_with_conversation().await;
        let a = Document::new(id.clone(), "a.txt", "txt", "a");
        let b = Document::new(id.clone(), "b.txt", "txt", "b");
        store.insert_document(&a).await.unwrap();
        store.insert_document(&b).await.unwrap();
        store.insert_chunk(&chunk(&a.id, 0, vec![1.0, 0.0])).await.unwrap();
        store.insert_chunk(&chunk(&b.id, 0, vec![1.0, 0.0])).await.unwrap();

        let hits = store.nearest_k(&[1.0, 0.0], &[b.id.clone()], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, b.id);
    }

    #[tokio::test]
    async fn touch_updates_timestamp() {
        let (store, id) = store_with_conversation().await;
        let when = Utc::now() + chrono::Duration::hours(1);
        store.touch(&id, when).await.unwrap();
        assert_eq!(store.get_conversation(&id).await.unwrap().unwrap().updated_at, when);
    }
}
