//! Document ingestion and conversation-scoped semantic search.

use std::sync::Arc;

use ctxkeeper_config::RetrievalConfig;
use ctxkeeper_core::{
    ConversationId, Document, DocumentChunk, DocumentId, DocumentStore, Embedder, Result,
    ScoredChunk, VectorIndex,
};
use tracing::{debug, info, warn};

use crate::chunker::DocumentChunker;
use crate::extract::{FileKind, extract_text};

pub const DEFAULT_TOP_K: usize = 5;

/// What an ingest stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub chunks_indexed: usize,
    /// Chunks dropped because their embedding failed
    pub chunks_skipped: usize,
}

/// Result of a search. Retrieval never fails a chat turn, so failures are
/// a variant rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Hits(Vec<ScoredChunk>),
    /// No documents, or no chunks, in scope
    Empty,
    /// Embedding or index lookup failed
    Failed(String),
}

impl SearchOutcome {
    /// Hits best first; empty for the other variants.
    pub fn hits(&self) -> &[ScoredChunk] {
        match self {
            Self::Hits(hits) => hits,
            Self::Empty | Self::Failed(_) => &[],
        }
    }

    pub fn is_hits(&self) -> bool {
        matches!(self, Self::Hits(_))
    }
}

pub struct RetrievalService {
    documents: Arc<dyn DocumentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: DocumentChunker,
    top_k: usize,
}

impl RetrievalService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            documents,
            index,
            embedder,
            chunker: DocumentChunker::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn from_config(
        config: &RetrievalConfig,
        documents: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self::new(documents, index, embedder)
            .with_chunker(DocumentChunker::new(config.chunk_size_words))
            .with_top_k(config.top_k)
    }

    pub fn with_chunker(mut self, chunker: DocumentChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Extract, persist, chunk and embed an uploaded file.
    ///
    /// Unsupported types and extraction failures are rejected before
    /// anything is stored. A chunk whose embedding fails is skipped; the
    /// remaining chunks keep contiguous indices.
    pub async fn ingest(
        &self,
        conversation: &ConversationId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestReport> {
        let kind = FileKind::from_filename(filename)?;
        let size = bytes.len();
        let text = extract_text(kind, bytes).await?;

        let document = Document::new(conversation.clone(), filename, kind.as_str(), text);
        self.documents.insert_document(&document).await?;

        let chunks = self.chunker.chunk(&document.content);
        debug!(
            document = %document.id,
            kind = %kind,
            bytes = size,
            chunks = chunks.len(),
            "Document extracted"
        );

        let mut indexed = 0;
        let mut skipped = 0;
        for (position, text) in chunks.into_iter().enumerate() {
            let embedding = match self.embedder.embed(&text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        document = %document.id,
                        chunk = position,
                        error = %e,
                        "Embedding failed, chunk skipped"
                    );
                    skipped += 1;
                    continue;
                }
            };

            let chunk = DocumentChunk {
                document_id: document.id.clone(),
                chunk_index: indexed,
                text,
                embedding,
            };
            self.documents.insert_chunk(&chunk).await?;
            indexed += 1;
        }

        info!(
            conversation = %conversation,
            document = %document.id,
            filename,
            chunks_indexed = indexed,
            chunks_skipped = skipped,
            "Document ingested"
        );

        Ok(IngestReport {
            document_id: document.id,
            chunks_indexed: indexed,
            chunks_skipped: skipped,
        })
    }

    /// The `top_k` chunks of this conversation's documents closest to `query`.
    pub async fn search(&self, conversation: &ConversationId, query: &str, top_k: usize) -> SearchOutcome {
        let documents = match self.documents.list_documents(conversation).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "Listing documents failed");
                return SearchOutcome::Failed(e.to_string());
            }
        };

        if documents.is_empty() {
            debug!(conversation = %conversation, "No documents in scope");
            return SearchOutcome::Empty;
        }

        let vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "Query embedding failed");
                return SearchOutcome::Failed(e.to_string());
            }
        };

        let scope: Vec<DocumentId> = documents.into_iter().map(|d| d.id).collect();
        match self.index.nearest_k(&vector, &scope, top_k).await {
            Ok(hits) if hits.is_empty() => SearchOutcome::Empty,
            Ok(hits) => {
                debug!(
                    conversation = %conversation,
                    hits = hits.len(),
                    best = hits[0].score,
                    "Retrieved chunks"
                );
                SearchOutcome::Hits(hits)
            }
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "Vector search failed");
                SearchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Delete a document and its chunks. `false` when it did not exist.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        let deleted = self.documents.delete_document(id).await?;
        if deleted {
            info!(document = %id, "Document deleted");
        }
        Ok(deleted)
    }

    /// Documents of a conversation, oldest upload first.
    pub async fn list_documents(&self, conversation: &ConversationId) -> Result<Vec<Document>> {
        Ok(self.documents.list_documents(conversation).await?)
    }
}
