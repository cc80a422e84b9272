//! Indexing service: keeps one vector-indexed document per source entity.
//!
//! # Pipeline
//!
//! ```text
//! IndexDocument
//!   → searchable text (title + fields + raw content) → content hash
//!   → existing row with equal hash? → no-op
//!   → chunk → embed all chunks (any failure aborts, nothing written)
//!   → upsert chunk vectors, delete vectors of indexes that no longer exist
//!   → one transaction: upsert document row, delete old chunks, insert new
//! ```
//!
//! Chunk ids are `{document_id}_chunk_{i}`, so a re-index overwrites the
//! surviving vector ids in place and only the tail beyond the new count
//! needs deleting. The current chunk rows are read before any vector is
//! written. If a later step fails, the vector index is put back to those
//! rows, so searches keep returning exactly what the stored hash describes.
//!
//! Every operation on a natural key runs under that key's [`KeyedLocks`]
//! entry.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

use org_assist_core::chunk::{chunk_id, chunk_ids, content_hash, searchable_text, split_text};
use org_assist_core::embedding::{embed_many, Embedder};
use org_assist_core::error::EngineError;
use org_assist_core::models::{
    BatchOutcome, DocumentChunk, DocumentKey, IndexDocument, IndexFailure, IndexOutcome,
    IndexStats, IndexedDocument, OVERVIEW_CONTENT_TYPE,
};
use org_assist_core::overview::overview_document;
use org_assist_core::store::{DocumentStore, VectorMetadata, VectorRecord, VectorStore};

use crate::config::ChunkingConfig;
use crate::locks::KeyedLocks;

pub struct IndexingService {
    documents: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    batch_size: usize,
    locks: KeyedLocks,
}

impl IndexingService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            documents,
            vectors,
            embedder,
            chunking,
            batch_size,
            locks: KeyedLocks::new(),
        }
    }

    /// Index or re-index one source entity.
    pub async fn index_document(&self, doc: &IndexDocument) -> Result<IndexOutcome> {
        validate(doc)?;
        let key = doc.key();
        let _guard = self.locks.lock(&key.as_path()).await;

        let text = searchable_text(doc);
        let hash = content_hash(&text);

        let existing = self
            .documents
            .find_document(&key)
            .await
            .context("looking up indexed document")?;

        if let Some(existing) = &existing {
            if existing.content_hash == hash {
                tracing::debug!(document_id = %existing.id, key = %key.as_path(), "unchanged, skipping");
                return Ok(IndexOutcome {
                    document_id: existing.id.clone(),
                    chunks_created: 0,
                    is_new: false,
                    is_updated: false,
                });
            }
        }

        let document_id = existing
            .as_ref()
            .map(|d| d.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let previous = match &existing {
            Some(d) => self
                .documents
                .document_chunks(&d.id)
                .await
                .context("reading current chunks")?,
            None => Vec::new(),
        };

        let texts = split_text(&text, self.chunking.chunk_size, self.chunking.overlap);
        let embeddings = embed_many(self.embedder.as_ref(), &texts, self.batch_size)
            .await
            .context("embedding chunks")?;

        let now = Utc::now();
        let total = texts.len();
        let chunks: Vec<DocumentChunk> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| DocumentChunk {
                id: chunk_id(&document_id, i),
                source_entity_id: document_id.clone(),
                organization_id: doc.organization_id.clone(),
                content_type: doc.content_type.clone(),
                source_label: doc.title.clone(),
                text,
                embedding,
                chunk_index: i,
                total_chunks: total,
                created_at: now,
            })
            .collect();

        let indexed = IndexedDocument {
            id: document_id.clone(),
            key: key.clone(),
            title: doc.title.clone(),
            raw_content: doc.raw_content.clone(),
            content_type: doc.content_type.clone(),
            metadata: doc.metadata.clone(),
            content_hash: hash,
            chunk_count: chunks.len(),
            last_synced_at: now,
        };

        let previous_count = existing
            .as_ref()
            .map_or(0, |d| d.chunk_count)
            .max(previous.len());
        if let Err(e) = self.swap(&indexed, &chunks, previous_count).await {
            self.restore(&document_id, &key.source_id, &previous, chunks.len())
                .await;
            return Err(e);
        }

        let is_new = existing.is_none();
        tracing::info!(
            document_id = %document_id,
            chunks = chunks.len(),
            is_new,
            "indexed document"
        );

        Ok(IndexOutcome {
            document_id,
            chunks_created: chunks.len(),
            is_new,
            is_updated: !is_new,
        })
    }

    /// Index many documents. One document's failure is recorded and the
    /// rest still run. Organizations whose content changed get their
    /// overview refreshed afterwards.
    pub async fn index_documents(&self, docs: &[IndexDocument]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut changed_orgs = BTreeSet::new();

        for doc in docs {
            match self.index_document(doc).await {
                Ok(result) => {
                    if (result.is_new || result.is_updated)
                        && doc.content_type != OVERVIEW_CONTENT_TYPE
                    {
                        changed_orgs.insert(doc.organization_id.clone());
                    }
                    outcome.indexed.push(result);
                }
                Err(e) => {
                    let error = EngineError::describe(&e);
                    tracing::warn!(source_id = %doc.source_id, error = %error, "failed to index document");
                    outcome.errors.push(IndexFailure {
                        source_id: doc.source_id.clone(),
                        error,
                    });
                }
            }
        }

        for org in changed_orgs {
            if let Err(e) = self.refresh_overview(&org).await {
                tracing::warn!(organization_id = %org, error = %EngineError::describe(&e), "failed to refresh overview");
            }
        }

        tracing::info!(
            indexed = outcome.indexed.len(),
            failed = outcome.errors.len(),
            "batch indexing complete"
        );
        outcome
    }

    /// Delete a document, its chunks and their vectors. Returns `false` if
    /// the key was never indexed.
    pub async fn remove_document(&self, key: &DocumentKey) -> Result<bool> {
        let _guard = self.locks.lock(&key.as_path()).await;

        let Some(existing) = self
            .documents
            .find_document(key)
            .await
            .context("looking up indexed document")?
        else {
            tracing::debug!(key = %key.as_path(), "remove: not indexed");
            return Ok(false);
        };
        let previous = self
            .documents
            .document_chunks(&existing.id)
            .await
            .context("reading current chunks")?;

        // Vectors go first: a row without vectors is retried by the next
        // remove, a vector without a row would stay searchable.
        let ids = chunk_ids(&existing.id, existing.chunk_count.max(previous.len()));
        if !ids.is_empty() {
            self.vectors
                .delete(&ids)
                .await
                .context("deleting chunk vectors")?;
        }
        if let Err(e) = self
            .documents
            .delete_document(key)
            .await
            .context("deleting indexed document")
        {
            self.restore(&existing.id, &key.source_id, &previous, 0).await;
            return Err(e);
        }

        tracing::info!(document_id = %existing.id, chunks = previous.len(), "removed document");
        Ok(true)
    }

    pub async fn get_stats(&self, organization_id: &str) -> Result<IndexStats> {
        self.documents.stats(organization_id).await
    }

    /// Re-render and index the organization's overview document.
    pub async fn refresh_overview(&self, organization_id: &str) -> Result<IndexOutcome> {
        let stats = self.get_stats(organization_id).await?;
        self.index_document(&overview_document(organization_id, &stats))
            .await
    }

    /// Write the new vectors, drop the stale tail, then commit the rows.
    async fn swap(
        &self,
        indexed: &IndexedDocument,
        chunks: &[DocumentChunk],
        previous_count: usize,
    ) -> Result<()> {
        if !chunks.is_empty() {
            self.vectors
                .upsert(&vector_records(chunks, &indexed.key.source_id))
                .await
                .context("writing chunk vectors")?;
        }
        if previous_count > chunks.len() {
            let stale: Vec<String> = (chunks.len()..previous_count)
                .map(|i| chunk_id(&indexed.id, i))
                .collect();
            self.vectors
                .delete(&stale)
                .await
                .context("deleting stale chunk vectors")?;
        }
        self.documents
            .replace_document(indexed, chunks)
            .await
            .context("persisting document and chunks")
    }

    /// Bring the vector index back in line with `previous`, the chunk rows
    /// still stored for `document_id`. `written` is how many new chunk ids
    /// may have been upserted.
    async fn restore(
        &self,
        document_id: &str,
        source_id: &str,
        previous: &[DocumentChunk],
        written: usize,
    ) {
        let orphans: Vec<String> = (previous.len()..written)
            .map(|i| chunk_id(document_id, i))
            .collect();
        if !orphans.is_empty() {
            if let Err(e) = self.vectors.delete(&orphans).await {
                tracing::error!(document_id, error = %e, "failed to delete vectors of an aborted index");
            }
        }
        if !previous.is_empty() {
            if let Err(e) = self.vectors.upsert(&vector_records(previous, source_id)).await {
                tracing::error!(document_id, error = %e, "failed to restore chunk vectors");
            }
        }
        tracing::warn!(document_id, restored = previous.len(), "rolled back chunk vectors");
    }
}

fn vector_records(chunks: &[DocumentChunk], source_id: &str) -> Vec<VectorRecord> {
    chunks
        .iter()
        .map(|c| VectorRecord {
            id: c.id.clone(),
            values: c.embedding.clone(),
            metadata: VectorMetadata::for_chunk(c, source_id),
        })
        .collect()
}

fn validate(doc: &IndexDocument) -> Result<()> {
    for (name, value) in [
        ("organizationId", &doc.organization_id),
        ("sourceSchema", &doc.source_schema),
        ("sourceTable", &doc.source_table),
        ("sourceId", &doc.source_id),
        ("contentType", &doc.content_type),
    ] {
        if value.trim().is_empty() {
            bail!("{} must not be empty", name);
        }
    }
    Ok(())
}
