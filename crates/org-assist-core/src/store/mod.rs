//! Storage abstractions for org-assist.
//!
//! Three narrow traits cover everything the services persist or search:
//!
//! - [`VectorStore`]: external nearest-neighbor index with metadata filters.
//! - [`DocumentStore`]: indexed documents and their chunk sets; replacing a
//!   document's chunks must be all-or-nothing.
//! - [`ConversationStore`]: append-only per-session message log.
//!
//! Implementations must be `Send + Sync` to work with async runtimes. The
//! in-memory versions in [`memory`] back the unit and integration tests;
//! SQLite and HTTP implementations live in the app crate.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{
    ConversationTurn, DocumentChunk, DocumentKey, IndexStats, IndexedDocument, RetrievedChunk,
};

/// Metadata stored alongside every chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMetadata {
    pub organization_id: String,
    pub document_id: String,
    pub source_id: String,
    pub content_type: String,
    pub source_label: String,
    pub text: String,
    pub chunk_index: usize,
}

impl VectorMetadata {
    pub fn for_chunk(chunk: &DocumentChunk, source_id: &str) -> Self {
        Self {
            organization_id: chunk.organization_id.clone(),
            document_id: chunk.source_entity_id.clone(),
            source_id: source_id.to_string(),
            content_type: chunk.content_type.clone(),
            source_label: chunk.source_label.clone(),
            text: chunk.text.clone(),
            chunk_index: chunk.chunk_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

impl VectorMatch {
    pub fn into_retrieved(self) -> RetrievedChunk {
        RetrievedChunk {
            id: self.id,
            document_id: self.metadata.document_id,
            source_id: self.metadata.source_id,
            content_type: self.metadata.content_type,
            source_label: self.metadata.source_label,
            text: self.metadata.text,
            score: self.score,
        }
    }
}

/// Query filter. Organization is mandatory so no query can cross tenants.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFilter {
    pub organization_id: String,
    /// `None` or empty means any content type.
    pub content_types: Option<Vec<String>>,
}

impl VectorFilter {
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            content_types: None,
        }
    }

    pub fn with_content_types(mut self, content_types: Vec<String>) -> Self {
        self.content_types = Some(content_types);
        self
    }

    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        if metadata.organization_id != self.organization_id {
            return false;
        }
        match &self.content_types {
            Some(types) if !types.is_empty() => types.contains(&metadata.content_type),
            _ => true,
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite vectors by id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Top `top_k` matches by descending similarity.
    async fn query(&self, vector: &[f32], top_k: usize, filter: &VectorFilter)
        -> Result<Vec<VectorMatch>>;

    /// Delete by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_document(&self, key: &DocumentKey) -> Result<Option<IndexedDocument>>;

    /// Upsert the document row and swap its whole chunk set, atomically.
    async fn replace_document(&self, doc: &IndexedDocument, chunks: &[DocumentChunk])
        -> Result<()>;

    /// Delete the document and, by cascade, its chunks. Returns the removed
    /// row, or `None` if nothing matched.
    async fn delete_document(&self, key: &DocumentKey) -> Result<Option<IndexedDocument>>;

    /// Chunks of one document ordered by index.
    async fn document_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>>;

    async fn stats(&self, organization_id: &str) -> Result<IndexStats>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, turn: &ConversationTurn) -> Result<()>;

    /// The most recent `limit` turns of a session, oldest first.
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// Hard-delete a session. Returns the number of turns removed.
    async fn clear(&self, session_id: &str) -> Result<u64>;
}
