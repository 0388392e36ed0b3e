//! Error types for the ctxkeeper domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is the
//! taxonomy callers of the pipeline match on.

use thiserror::Error;

/// The top-level error type for all ctxkeeper operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Ingestion ---
    #[error("Unsupported file type: .{extension} (allowed: txt, md, pdf, docx)")]
    UnsupportedFileType { extension: String },

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    // --- Collaborators ---
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Text generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Persistence ---
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(StoreError),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a missing conversation.
    pub fn conversation_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound { kind: "Conversation", id: id.to_string() }
    }

    /// Shorthand for a missing document.
    pub fn document_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound { kind: "Document", id: id.to_string() }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("{kind} not found: {id}")]
    MissingParent { kind: &'static str, id: String },
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingParent { kind, id } => Self::NotFound { kind, id },
            other => Self::Storage(other),
        }
    }
}
