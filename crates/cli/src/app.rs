//! Composition root.
//!
//! Builds the store backend, provider, planner and retrieval service from
//! an [`AppConfig`] and hands them to the commands as one [`App`].

use std::sync::Arc;

use ctxkeeper_config::AppConfig;
use ctxkeeper_context::{ContextBudgetPlanner, Summarizer, TokenCounter};
use ctxkeeper_core::{
    Conversation, ConversationId, ConversationStore, DocumentStore, Embedder, Error, Message,
    Provider, Result, SummaryStore, VectorIndex,
};
use ctxkeeper_providers::{OpenAiCompatProvider, ProviderEmbedder};
use ctxkeeper_retrieval::RetrievalService;
use ctxkeeper_store::{InMemoryStore, SqliteStore};
use tracing::info;

/// The four store roles, usually backed by one object.
#[derive(Clone)]
pub struct Stores {
    pub backend: &'static str,
    pub conversations: Arc<dyn ConversationStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub summaries: Arc<dyn SummaryStore>,
    pub index: Arc<dyn VectorIndex>,
}

impl Stores {
    pub fn from_backend<S>(backend: &'static str, store: S) -> Self
    where
        S: ConversationStore + DocumentStore + SummaryStore + VectorIndex + 'static,
    {
        let store = Arc::new(store);
        Self {
            backend,
            conversations: store.clone(),
            documents: store.clone(),
            summaries: store.clone(),
            index: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend("memory", InMemoryStore::new())
    }

    /// Open the backend named in `[database]`.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let url = config.database.resolved_url();
        match config.database.backend.as_str() {
            "memory" => Ok(Self::in_memory()),
            "sqlite" => {
                if config.database.url.is_none() {
                    std::fs::create_dir_all(AppConfig::config_dir()).map_err(|e| Error::Config {
                        message: format!("cannot create config directory: {e}"),
                    })?;
                }
                let store = SqliteStore::new(&url).await?;
                Ok(Self::from_backend("sqlite", store))
            }
            "postgres" => open_postgres(&url, config.provider.embedding_dimension).await,
            other => Err(Error::Config {
                message: format!("unknown database backend '{other}'"),
            }),
        }
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(url: &str, dimension: usize) -> Result<Stores> {
    let store = ctxkeeper_store::PostgresStore::connect(url, dimension).await?;
    Ok(Stores::from_backend("postgres", store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_url: &str, _dimension: usize) -> Result<Stores> {
    Err(Error::Config {
        message: "this build has no PostgreSQL support (enable the `postgres` feature)".into(),
    })
}

pub struct App {
    pub config: AppConfig,
    pub stores: Stores,
    pub provider: Arc<dyn Provider>,
    pub planner: ContextBudgetPlanner,
    pub retrieval: RetrievalService,
}

impl App {
    /// Wire everything from configuration, talking to the configured server.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let stores = Stores::open(&config).await?;
        let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);
        let embedder: Arc<dyn Embedder> = Arc::new(ProviderEmbedder::new(
            provider.clone(),
            config.provider.embedding_model.clone(),
            config.provider.embedding_dimension,
        ));

        info!(
            backend = stores.backend,
            provider = provider.name(),
            model = %config.default_model,
            "ctxkeeper initialized"
        );

        Ok(Self::assemble(config, stores, provider, embedder))
    }

    /// Wire an app from already built collaborators.
    pub fn assemble(
        config: AppConfig,
        stores: Stores,
        provider: Arc<dyn Provider>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let planner = ContextBudgetPlanner::from_config(
            &config,
            stores.conversations.clone(),
            stores.summaries.clone(),
            Summarizer::new(provider.clone()),
        );
        let retrieval = RetrievalService::from_config(
            &config.retrieval,
            stores.documents.clone(),
            stores.index.clone(),
            embedder,
        );

        Self {
            config,
            stores,
            provider,
            planner,
            retrieval,
        }
    }

    pub fn counter(&self) -> &TokenCounter {
        self.planner.counter()
    }

    /// `requested`, or the configured default model.
    pub fn model_or_default(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.config.default_model.clone())
    }

    pub async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let conversation = match title {
            Some(title) => Conversation::titled(title),
            None => Conversation::new(),
        };
        self.stores.conversations.create_conversation(&conversation).await?;
        info!(conversation = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    pub async fn require_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        self.stores
            .conversations
            .get_conversation(id)
            .await?
            .ok_or_else(|| Error::conversation_not_found(id))
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.stores.conversations.list_conversations().await?)
    }

    pub async fn history(&self, id: &ConversationId) -> Result<Vec<Message>> {
        self.require_conversation(id).await?;
        Ok(self.stores.conversations.load_history(id).await?)
    }

    /// Delete a conversation with its messages, documents and summaries.
    pub async fn delete_conversation(&self, id: &ConversationId) -> Result<bool> {
        let deleted = self.stores.conversations.delete_conversation(id).await?;
        if deleted {
            info!(conversation = %id, "Conversation deleted");
        }
        Ok(deleted)
    }
}
