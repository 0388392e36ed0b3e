//! SQLite backend.
//!
//! One database file holds five tables:
//! - `conversations` and `messages`: append-only chat history
//! - `documents` and `document_chunks`: ingested text with embedding blobs
//! - `conversation_summaries`: compaction results, latest row wins
//!
//! Foreign keys cascade deletes from conversations down to chunks.
//! Timestamps are fixed-width RFC 3339 strings (nanoseconds, `Z`), so
//! lexical order equals chronological order.

use crate::vector;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ctxkeeper_core::error::StoreError;
use ctxkeeper_core::{
    Conversation, ConversationId, ConversationStore, ConversationSummary, Document,
    DocumentChunk, DocumentId, DocumentStore, Message, ScoredChunk, SummaryStore, VectorIndex,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database; it is held on a
    /// single long-lived connection so it survives between queries.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        const STATEMENTS: &[(&str, &str)] = &[
            (
                "conversations table",
                r#"
                CREATE TABLE IF NOT EXISTS conversations (
                    id          TEXT PRIMARY KEY,
                    title       TEXT NOT NULL,
                    created_at  TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages table",
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                    id              TEXT UNIQUE NOT NULL,
                    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                    role            TEXT NOT NULL,
                    content         TEXT NOT NULL,
                    images          TEXT NOT NULL DEFAULT '[]',
                    model           TEXT,
                    created_at      TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages index",
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at, iid)",
            ),
            (
                "documents table",
                r#"
                CREATE TABLE IF NOT EXISTS documents (
                    iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                    id              TEXT UNIQUE NOT NULL,
                    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                    filename        TEXT NOT NULL,
                    file_type       TEXT NOT NULL,
                    content         TEXT NOT NULL,
                    uploaded_at     TEXT NOT NULL
                )
                "#,
            ),
            (
                "document_chunks table",
                r#"
                CREATE TABLE IF NOT EXISTS document_chunks (
                    iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                    document_id  TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                    chunk_index  INTEGER NOT NULL,
                    chunk_text   TEXT NOT NULL,
                    embedding    BLOB NOT NULL,
                    UNIQUE(document_id, chunk_index)
                )
                "#,
            ),
            (
                "conversation_summaries table",
                r#"
                CREATE TABLE IF NOT EXISTS conversation_summaries (
                    iid                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id     TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                    summary_text        TEXT NOT NULL,
                    messages_summarized INTEGER NOT NULL,
                    created_at          TEXT NOT NULL
                )
                "#,
            ),
            (
                "summaries index",
                "CREATE INDEX IF NOT EXISTS idx_summaries_conversation ON conversation_summaries(conversation_id, created_at DESC)",
            ),
        ];

        for (what, sql) in STATEMENTS {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }
}

// --- Row codecs ---

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("{column}: {e}")))
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn row_to_conversation(row: &SqliteRow) -> Result<Conversation, StoreError> {
    Ok(Conversation {
        id: ConversationId(col(row, "id")?),
        title: col(row, "title")?,
        created_at: parse_ts(&col::<String>(row, "created_at")?, "created_at")?,
        updated_at: parse_ts(&col::<String>(row, "updated_at")?, "updated_at")?,
    })
}

fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
    let role: String = col(row, "role")?;
    let images: String = col(row, "images")?;
    Ok(Message {
        id: col(row, "id")?,
        role: role.parse().map_err(StoreError::CorruptRow)?,
        content: col(row, "content")?,
        images: serde_json::from_str(&images)
            .map_err(|e| StoreError::CorruptRow(format!("images: {e}")))?,
        model: col(row, "model")?,
        timestamp: parse_ts(&col::<String>(row, "created_at")?, "created_at")?,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document, StoreError> {
    Ok(Document {
        id: DocumentId(col(row, "id")?),
        conversation_id: ConversationId(col(row, "conversation_id")?),
        filename: col(row, "filename")?,
        file_type: col(row, "file_type")?,
        content: col(row, "content")?,
        uploaded_at: parse_ts(&col::<String>(row, "uploaded_at")?, "uploaded_at")?,
    })
}

fn row_to_chunk(row: &SqliteRow) -> Result<DocumentChunk, StoreError> {
    Ok(DocumentChunk {
        document_id: DocumentId(col(row, "document_id")?),
        chunk_index: col::<i64>(row, "chunk_index")? as usize,
        text: col(row, "chunk_text")?,
        embedding: vector::blob_to_embedding(&col::<Vec<u8>>(row, "embedding")?),
    })
}

/// Foreign-key failures mean the parent row is gone.
fn insert_error(e: sqlx::Error, kind: &'static str, parent: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::MissingParent {
            kind,
            id: parent.to_string(),
        },
        _ => StoreError::Storage(format!("INSERT failed: {e}")),
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(conversation.id.as_str())
            .bind(&conversation.title)
            .bind(ts(&conversation.created_at))
            .bind(ts(&conversation.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT conversation failed: {e}")))?;
        Ok(())
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET conversation: {e}")))?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST conversations: {e}")))?;

        rows.iter().map(row_to_conversation).collect()
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE conversation failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_message(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError> {
        let images = serde_json::to_string(&message.images)
            .map_err(|e| StoreError::Storage(format!("images: {e}")))?;

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, images, model, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&message.id)
        .bind(id.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(images)
        .bind(message.model.as_deref())
        .bind(ts(&message.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "Conversation", id.as_str()))?;

        Ok(())
    }

    async fn load_history(&self, id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, iid ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LOAD history: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    async fn touch(&self, id: &ConversationId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(ts(&now))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("TOUCH failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingParent { kind: "Conversation", id: id.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (id, conversation_id, filename, file_type, content, uploaded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(document.id.as_str())
        .bind(document.conversation_id.as_str())
        .bind(&document.filename)
        .bind(&document.file_type)
        .bind(&document.content)
        .bind(ts(&document.uploaded_at))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "Conversation", document.conversation_id.as_str()))?;

        Ok(())
    }

    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO document_chunks (document_id, chunk_index, chunk_text, embedding) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(chunk.document_id.as_str())
        .bind(chunk.chunk_index as i64)
        .bind(&chunk.text)
        .bind(vector::embedding_to_blob(&chunk.embedding))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "Document", chunk.document_id.as_str()))?;

        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET document: {e}")))?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(&self, conversation: &ConversationId) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE conversation_id = ?1 ORDER BY uploaded_at ASC, iid ASC",
        )
        .bind(conversation.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST documents: {e}")))?;

        rows.iter().map(row_to_document).collect()
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE document failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn chunk_count(&self, id: &DocumentId) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM document_chunks WHERE document_id = ?1")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT chunks: {e}")))?;

        Ok(col::<i64>(&row, "cnt")? as usize)
    }
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn latest_summary(&self, id: &ConversationId) -> Result<Option<ConversationSummary>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM conversation_summaries WHERE conversation_id = ?1 \
             ORDER BY created_at DESC, iid DESC LIMIT 1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LATEST summary: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ConversationSummary {
            conversation_id: ConversationId(col(&row, "conversation_id")?),
            summary_text: col(&row, "summary_text")?,
            messages_summarized: col::<i64>(&row, "messages_summarized")? as usize,
            created_at: parse_ts(&col::<String>(&row, "created_at")?, "created_at")?,
        }))
    }

    async fn save_summary(&self, summary: &ConversationSummary) -> Result<bool, StoreError> {
        // Single statement, so the comparison and the insert are atomic.
        let result = sqlx::query(
            r#"
            INSERT INTO conversation_summaries (conversation_id, summary_text, messages_summarized, created_at)
            SELECT ?1, ?2, ?3, ?4
            WHERE ?3 >= COALESCE((
                SELECT messages_summarized FROM conversation_summaries
                WHERE conversation_id = ?1
                ORDER BY created_at DESC, iid DESC LIMIT 1
            ), 0)
            "#,
        )
        .bind(summary.conversation_id.as_str())
        .bind(&summary.summary_text)
        .bind(summary.messages_summarized as i64)
        .bind(ts(&summary.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "Conversation", summary.conversation_id.as_str()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn nearest_k(
        &self,
        query: &[f32],
        scope: &[DocumentId],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if scope.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM document_chunks WHERE document_id IN (");
        let mut ids = qb.separated(", ");
        for id in scope {
            ids.push_bind(id.as_str());
        }
        qb.push(") ORDER BY iid ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Vector scan failed: {e}")))?;

        let chunks = rows.iter().map(row_to_chunk).collect::<Result<Vec<_>, _>>()?;
        Ok(vector::rank_chunks(&chunks, query, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    async fn with_conversation(store: &SqliteStore) -> ConversationId {
        let conv = Conversation::new();
        store.create_conversation(&conv).await.unwrap();
        conv.id
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
    async fn conversation_round_trip() {
        let store = test_store().await;
        let conv = Conversation::titled("Rust questions");
        store.create_conversation(&conv).await.unwrap();

        let loaded = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Rust questions");
        assert_eq!(loaded.created_at, conv.created_at);
    }

    #[tokio::test]
    async fn message_round_trip_preserves_fields() {
        let store = test_store().await;
        let id = with_conversation(&store).await;
        let msg = Message::assistant("Answer")
            .with_model("phi3:latest")
            .with_images(vec!["aGk=".into()]);
        store.append_message(&id, &msg).await.unwrap();

        let history = store.load_history(&id).await.unwrap();
        assert_eq!(history, vec![msg]);
    }

    #[tokio::test]
    async fn history_orders_by_timestamp_then_insertion() {
        let store = test_store().await;
        let id = with_conversation(&store).await;
        let t0 = Utc::now();
        store
            .append_message(&id, &Message::user("late").at(t0 + chrono::Duration::seconds(1)))
            .await
            .unwrap();
        store.append_message(&id, &Message::user("a").at(t0)).await.unwrap();
        store.append_message(&id, &Message::user("b").at(t0)).await.unwrap();

        let contents: Vec<_> = store
            .load_history(&id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["a", "b", "late"]);
    }

    #[tokio::test]
    async fn append_to_missing_conversation_is_missing_parent() {
        let store = test_store().await;
        let err = store
            .append_message(&ConversationId::from("ghost"), &Message::user("boo"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingParent { kind: "Conversation", .. }));
    }

    #[tokio::test]
    async fn summary_compare_and_swap() {
        let store = test_store().await;
        let id = with_conversation(&store).await;
        assert!(store.latest_summary(&id).await.unwrap().is_none());

        assert!(store.save_summary(&ConversationSummary::new(id.clone(), "ten", 10)).await.unwrap());
        assert!(!store.save_summary(&ConversationSummary::new(id.clone(), "five", 5)).await.unwrap());

        let latest = store.latest_summary(&id).await.unwrap().unwrap();
        assert_eq!(latest.summary_text, "ten");
        assert_eq!(latest.messages_summarized, 10);
    }

    #[tokio::test]
    async fn delete_conversation_cascades_to_everything() {
        let store = test_store().await;
        let id = with_conversation(&store).await;
        let doc = Document::new(id.clone(), "notes.txt", "txt", "alpha beta");
        store.insert_document(&doc).await.unwrap();
        store.insert_chunk(&chunk(&doc.id, 0, vec![1.0, 0.0])).await.unwrap();
        store.append_message(&id, &Message::user("hi")).await.unwrap();
        store.save_summary(&ConversationSummary::new(id.clone(), "s", 1)).await.unwrap();

        assert!(store.delete_conversation(&id).await.unwrap());
        assert!(store.get_document(&doc.id).await.unwrap().is_none());
        assert_eq!(store.chunk_count(&doc.id).await.unwrap(), 0);
        assert!(store.load_history(&id).await.unwrap().is_empty());
        assert!(store.latest_summary(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_document_cascades_to_chunks() {
        let store = test_store().await;
        let id = with_conversation(&store).await;
        let doc = Document::new(id.clone(), "a.md", "md", "# a");
        store.insert_document(&doc).await.unwrap();
        for i in 0..3 {
            store.insert_chunk(&chunk(&doc.id, i, vec![i as f32, 1.0])).await.unwrap();
        }
        assert_eq!(store.chunk_count(&doc.id).await.unwrap(), 3);

        assert!(store.delete_document(&doc.id).await.unwrap());
        assert_eq!(store.chunk_count(&doc.id).await.unwrap(), 0);
        assert!(!store.delete_document(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_chunk_index_rejected() {
        let store = test_store().await;
        let id = with_conversation(&store).await;
        let doc = Document::new(id, "a.txt", "txt", "x");
        store.insert_document(&doc).await.unwrap();
        store.insert_chunk(&chunk(&doc.id, 0, vec![1.0])).await.unwrap();
        assert!(store.insert_chunk(&chunk(&doc.id, 0, vec![1.0])).await.is_err());
    }

    #[tokio::test]
    async fn nearest_k_scopes_and_ranks() {
        let store = test_store().await;
        let mine = with_conversation(&store).await;
        let theirs = with_conversation(&store).await;

        let a = Document::new(mine.clone(), "a.txt", "txt", "a");
        let b = Document::new(theirs.clone(), "b.txt", "txt", "b");
        store.insert_document(&a).await.unwrap();
        store.insert_document(&b).await.unwrap();
        store.insert_chunk(&chunk(&a.id, 0, vec![0.0, 1.0])).await.unwrap();
        store.insert_chunk(&chunk(&a.id, 1, vec![1.0, 0.0])).await.unwrap();
        store.insert_chunk(&chunk(&b.id, 0, vec![1.0, 0.0])).await.unwrap();

        let hits = store.nearest_k(&[1.0, 0.0], &[a.id.clone()], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.document_id == a.id));
        assert_eq!(hits[0].chunk_index, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn nearest_k_with_empty_scope_is_empty() {
        let store = test_store().await;
        assert!(store.nearest_k(&[1.0], &[], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn touch_and_list_order() {
        let store = test_store().await;
        let older = with_conversation(&store).await;
        let newer = with_conversation(&store).await;
        store.touch(&older, Utc::now() + chrono::Duration::minutes(5)).await.unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed[0].id, older);
        assert_eq!(listed[1].id, newer);
    }

    #[tokio::test]
    async fn file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ctx.db").display());
        let id = {
            let store = SqliteStore::new(&url).await.unwrap();
            let id = with_conversation(&store).await;
            store.append_message(&id, &Message::user("persisted")).await.unwrap();
            id
        };

        let reopened = SqliteStore::new(&url).await.unwrap();
        let history = reopened.load_history(&id).await.unwrap();
        assert_eq!(history[0].content, "persisted");
    }
}
