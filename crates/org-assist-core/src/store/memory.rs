//! In-memory store implementations for tests and embedded use.
//!
//! Uses `HashMap`/`Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over every stored vector. A poisoned lock
//! is recovered rather than propagated; every write leaves the maps
//! consistent before it can panic.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ConversationTurn, DocumentChunk, DocumentKey, IndexStats, IndexedDocument};

use super::{
    ConversationStore, DocumentStore, VectorFilter, VectorMatch, VectorRecord, VectorStore,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Vector index held in a map keyed by vector id.
#[derive(Default)]
pub struct InMemoryVectorStore {
    vectors: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.vectors).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.vectors).keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut vectors = write(&self.vectors);
        for record in records {
            vectors.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        let vectors = read(&self.vectors);
        let mut matches: Vec<VectorMatch> = vectors
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut vectors = write(&self.vectors);
        for id in ids {
            vectors.remove(id);
        }
        Ok(())
    }
}

struct StoredDocument {
    doc: IndexedDocument,
    chunks: Vec<DocumentChunk>,
}

/// Documents keyed by natural key. A replace swaps the row and chunk set
/// under one write lock, so readers never see a half-applied update.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<DocumentKey, StoredDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_document(&self, key: &DocumentKey) -> Result<Option<IndexedDocument>> {
        Ok(read(&self.docs).get(key).map(|s| s.doc.clone()))
    }

    async fn replace_document(
        &self,
        doc: &IndexedDocument,
        chunks: &[DocumentChunk],
    ) -> Result<()> {
        let mut chunks = chunks.to_vec();
        chunks.sort_by_key(|c| c.chunk_index);
        write(&self.docs).insert(
            doc.key.clone(),
            StoredDocument {
                doc: doc.clone(),
                chunks,
            },
        );
        Ok(())
    }

    async fn delete_document(&self, key: &DocumentKey) -> Result<Option<IndexedDocument>> {
        Ok(write(&self.docs).remove(key).map(|s| s.doc))
    }

    async fn document_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        Ok(read(&self.docs)
            .values()
            .find(|s| s.doc.id == document_id)
            .map(|s| s.chunks.clone())
            .unwrap_or_default())
    }

    async fn stats(&self, organization_id: &str) -> Result<IndexStats> {
        let docs = read(&self.docs);
        let mut stats = IndexStats::default();
        for stored in docs
            .values()
            .filter(|s| s.doc.key.organization_id == organization_id)
        {
            stats.total_documents += 1;
            stats.total_chunks += stored.chunks.len() as u64;
            *stats
                .by_content_type
                .entry(stored.doc.content_type.clone())
                .or_insert(0) += 1;
            if stats
                .last_synced_at
                .map_or(true, |t| stored.doc.last_synced_at > t)
            {
                stats.last_synced_at = Some(stored.doc.last_synced_at);
            }
        }
        Ok(stats)
    }
}

/// Per-session turn logs in append order.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, turn: &ConversationTurn) -> Result<()> {
        write(&self.sessions)
            .entry(turn.session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let sessions = read(&self.sessions);
        let Some(turns) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }

    async fn clear(&self, session_id: &str) -> Result<u64> {
        Ok(write(&self.sessions)
            .remove(session_id)
            .map(|turns| turns.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, Role};
    use crate::store::VectorMetadata;
    use chrono::Utc;

    fn record(id: &str, org: &str, content_type: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: VectorMetadata {
                organization_id: org.to_string(),
                document_id: format!("doc-{}", id),
                source_id: id.to_string(),
                content_type: content_type.to_string(),
                source_label: id.to_string(),
                text: format!("text {}", id),
                chunk_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_vector_query_filters_and_ranks() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                record("a", "org1", "task", vec![1.0, 0.0]),
                record("b", "org1", "client", vec![0.9, 0.1]),
                record("c", "org2", "task", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, &VectorFilter::organization("org1"))
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let tasks = store
            .query(
                &[1.0, 0.0],
                10,
                &VectorFilter::organization("org1").with_content_types(vec!["client".into()]),
            )
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "b");

        let top1 = store
            .query(&[1.0, 0.0], 1, &VectorFilter::organization("org1"))
            .await
            .unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn test_vector_delete_ignores_unknown() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[record("a", "org1", "task", vec![1.0])])
            .await
            .unwrap();
        store
            .delete(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_history_returns_latest_oldest_first() {
        let store = InMemoryConversationStore::new();
        let who = Identity {
            organization_id: "org1".into(),
            user_id: "u1".into(),
        };
        for i in 0..5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store
                .append(&ConversationTurn::new(&who, "s1", role, &format!("m{}", i)))
                .await
                .unwrap();
        }

        let last3: Vec<_> = store
            .history("s1", 3)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(last3, vec!["m2", "m3", "m4"]);

        assert!(store.history("other", 3).await.unwrap().is_empty());
        assert_eq!(store.clear("s1").await.unwrap(), 5);
        assert!(store.history("s1", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_document_stats() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.stats("org1").await.unwrap().total_documents, 0);

        let key = DocumentKey {
            organization_id: "org1".into(),
            source_schema: "crm".into(),
            source_table: "clients".into(),
            source_id: "c1".into(),
        };
        let doc = IndexedDocument {
            id: "d1".into(),
            key: key.clone(),
            title: "Acme".into(),
            raw_content: String::new(),
            content_type: "client".into(),
            metadata: Default::default(),
            content_hash: "h".into(),
            chunk_count: 1,
            last_synced_at: Utc::now(),
        };
        let chunk = DocumentChunk {
            id: "d1_chunk_0".into(),
            source_entity_id: "d1".into(),
            organization_id: "org1".into(),
            content_type: "client".into(),
            source_label: "Acme".into(),
            text: "Acme".into(),
            embedding: vec![1.0],
            chunk_index: 0,
            total_chunks: 1,
            created_at: Utc::now(),
        };
        store.replace_document(&doc, &[chunk]).await.unwrap();

        let stats = store.stats("org1").await.unwrap();
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.by_content_type["client"], 1);
        assert!(stats.last_synced_at.is_some());

        assert!(store.delete_document(&key).await.unwrap().is_some());
        assert!(store.delete_document(&key).await.unwrap().is_none());
    }
}
