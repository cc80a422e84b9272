//! Application context.
//!
//! Everything a request needs is built once from [`Config`] and shared by
//! the HTTP server and the CLI: no component reaches for a global.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use org_assist_core::actions::ActionGateway;
use org_assist_core::chat::ChatModel;
use org_assist_core::embedding::Embedder;
use org_assist_core::store::{ConversationStore, DocumentStore, VectorStore};

use crate::agent::AgentOrchestrator;
use crate::chat::create_chat_model;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::engine::QueryEngine;
use crate::gateway::HttpActionGateway;
use crate::indexing::IndexingService;
use crate::migrate;
use crate::rag::RagAnswerer;
use crate::retrieval::RetrievalService;
use crate::sessions::CachedConversationStore;
use crate::sqlite_store::{SqliteConversationStore, SqliteDocumentStore};
use crate::vector_store::create_vector_store;

/// Storage and provider handles an [`AppContext`] is assembled from.
pub struct Components {
    pub documents: Arc<dyn DocumentStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
    pub gateway: Arc<dyn ActionGateway>,
}

pub struct AppContext {
    pub config: Config,
    pub indexing: Arc<IndexingService>,
    pub retrieval: Arc<RetrievalService>,
    pub engine: Arc<QueryEngine>,
}

impl AppContext {
    /// Open the database (running migrations), build the configured
    /// providers and wire the services.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate(&pool).await?;

        let sessions = &config.sessions;
        let conversations = Arc::new(CachedConversationStore::new(
            Arc::new(SqliteConversationStore::new(pool.clone())),
            Duration::from_secs(sessions.ttl_secs),
            sessions.max_sessions,
        ));

        let components = Components {
            documents: Arc::new(SqliteDocumentStore::new(pool.clone())),
            vectors: create_vector_store(&config.vector_store, &pool)?,
            conversations,
            embedder: create_embedder(&config.embedding)?,
            chat: create_chat_model(&config.chat)?,
            gateway: Arc::new(HttpActionGateway::new(&config.gateway)?),
        };

        tracing::debug!(
            embedding = %config.embedding.provider,
            chat = %config.chat.provider,
            vector_store = %config.vector_store.provider,
            "application context ready"
        );
        Ok(Self::from_components(config.clone(), components))
    }

    pub fn from_components(config: Config, parts: Components) -> Self {
        let indexing = Arc::new(IndexingService::new(
            parts.documents,
            parts.vectors.clone(),
            parts.embedder.clone(),
            config.chunking.clone(),
            config.embedding.batch_size,
        ));
        let retrieval = Arc::new(RetrievalService::new(
            parts.embedder,
            parts.vectors,
            config.retrieval.clone(),
        ));
        let agent = AgentOrchestrator::new(
            parts.chat.clone(),
            parts.gateway,
            config.agent.max_iterations,
            Duration::from_secs(config.agent.tool_timeout_secs),
        );
        let engine = Arc::new(QueryEngine::new(
            RagAnswerer::new(retrieval.clone(), parts.chat),
            agent,
            parts.conversations,
            config.sessions.history_limit,
        ));

        Self {
            config,
            indexing,
            retrieval,
            engine,
        }
    }
}
