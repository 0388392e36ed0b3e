//! # ctxkeeper Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! ctxkeeper context pipeline. This crate has **no framework dependencies**;
//! it defines the model every other crate implements against.
//!
//! ## Layout
//!
//! - [`message`]: conversations and their append-only message history
//! - [`document`]: ingested documents, chunks, and compaction summaries
//! - [`provider`]: the text-generation capability
//! - [`embedding`]: the text-to-vector capability
//! - [`store`]: persistence traits, including the scoped [`VectorIndex`]

pub mod document;
pub mod embedding;
pub mod error;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use document::{ConversationSummary, Document, DocumentChunk, DocumentId, ScoredChunk};
pub use embedding::Embedder;
pub use error::{Error, ProviderError, Result, StoreError};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use store::{ConversationStore, DocumentStore, SummaryStore, VectorIndex};
