//! Persistence backends for ctxkeeper.
//!
//! Every backend implements all four store traits from `ctxkeeper_core`
//! (`ConversationStore`, `DocumentStore`, `SummaryStore`, `VectorIndex`).

pub mod in_memory;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use vector::{cosine_similarity, rank_chunks};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
