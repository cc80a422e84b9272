//! Core data models used throughout org-assist.
//!
//! These types represent the indexed documents, chunks, conversation turns
//! and retrieval hits that flow through the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content type reserved for the per-organization summary pseudo-document.
pub const OVERVIEW_CONTENT_TYPE: &str = "organization_overview";

/// Natural key of an indexed source entity.
///
/// Unique per `(organization_id, source_schema, source_table, source_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentKey {
    pub organization_id: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_id: String,
}

impl DocumentKey {
    /// Stable string form, used for logging and keyed locks.
    pub fn as_path(&self) -> String {
        format!(
            "{}/{}.{}/{}",
            self.organization_id, self.source_schema, self.source_table, self.source_id
        )
    }
}

/// A source entity submitted for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    pub organization_id: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub raw_content: String,
    pub content_type: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl IndexDocument {
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            organization_id: self.organization_id.clone(),
            source_schema: self.source_schema.clone(),
            source_table: self.source_table.clone(),
            source_id: self.source_id.clone(),
        }
    }
}

/// One indexed document per source entity, as persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedDocument {
    pub id: String,
    pub key: DocumentKey,
    pub title: String,
    pub raw_content: String,
    pub content_type: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Sole re-indexing gate: equal hash means nothing to do.
    pub content_hash: String,
    /// Number of chunks currently owned, so their ids can be derived
    /// without reading them back.
    pub chunk_count: usize,
    pub last_synced_at: DateTime<Utc>,
}

/// An immutable slice of a document, with its embedding.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: String,
    pub source_entity_id: String,
    pub organization_id: String,
    pub content_type: String,
    pub source_label: String,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub created_at: DateTime<Utc>,
}

/// Result of a single `index_document` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutcome {
    pub document_id: String,
    pub chunks_created: usize,
    pub is_new: bool,
    pub is_updated: bool,
}

/// Per-document failure captured by batch indexing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFailure {
    pub source_id: String,
    pub error: String,
}

/// Result of `index_documents`: successes and isolated failures.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub indexed: Vec<IndexOutcome>,
    pub errors: Vec<IndexFailure>,
}

/// Read-only index statistics for one organization.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_documents: u64,
    pub total_chunks: u64,
    pub by_content_type: BTreeMap<String, u64>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One message in a session's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub session_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(identity: &Identity, session_id: &str, role: Role, content: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            organization_id: identity.organization_id.clone(),
            user_id: identity.user_id.clone(),
            role,
            content: content.to_string(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// An already-authenticated caller, passed through to backends untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub organization_id: String,
    pub user_id: String,
}

/// A chunk returned by similarity search, hydrated from vector metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub id: String,
    pub document_id: String,
    pub source_id: String,
    pub content_type: String,
    pub source_label: String,
    pub text: String,
    pub score: f32,
}
