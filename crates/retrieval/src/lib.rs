//! Retrieval-augmented generation for ctxkeeper.
//!
//! Uploaded files are extracted to text, split by [`DocumentChunker`],
//! embedded and stored per conversation. [`RetrievalService::search`]
//! returns the closest chunks of the conversation's own documents, which
//! [`augment_prompt`] folds into the user's turn.

pub mod chunker;
pub mod extract;
pub mod prompt;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chunker::DocumentChunker;
pub use extract::{FileKind, TextExtractor, extract_text};
pub use prompt::{augment_prompt, format_context};
pub use service::{IngestReport, RetrievalService, SearchOutcome};
