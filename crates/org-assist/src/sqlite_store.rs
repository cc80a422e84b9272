//! SQLite-backed store implementations.
//!
//! - [`SqliteDocumentStore`]: `indexed_documents` + `document_chunks`; the
//!   document upsert and chunk swap share one transaction.
//! - [`SqliteConversationStore`]: `conversation_turns`, append-only.
//! - [`SqliteVectorStore`]: the local `sqlite` vector provider:
//!   brute-force cosine similarity over BLOB vectors, with the organization
//!   and content-type filter applied in SQL.
//!
//! Timestamps are stored as Unix milliseconds.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use org_assist_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use org_assist_core::models::{
    ConversationTurn, DocumentChunk, DocumentKey, IndexStats, IndexedDocument, Role,
};
use org_assist_core::store::{
    ConversationStore, DocumentStore, VectorFilter, VectorMatch, VectorMetadata, VectorRecord,
    VectorStore,
};

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_metadata(json: &str) -> serde_json::Map<String, serde_json::Value> {
    serde_json::from_str(json).unwrap_or_default()
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &SqliteRow) -> IndexedDocument {
    IndexedDocument {
        id: row.get("id"),
        key: DocumentKey {
            organization_id: row.get("organization_id"),
            source_schema: row.get("source_schema"),
            source_table: row.get("source_table"),
            source_id: row.get("source_id"),
        },
        title: row.get("title"),
        raw_content: row.get("raw_content"),
        content_type: row.get("content_type"),
        metadata: parse_metadata(row.get::<&str, _>("metadata_json")),
        content_hash: row.get("content_hash"),
        chunk_count: row.get::<i64, _>("chunk_count").max(0) as usize,
        last_synced_at: from_millis(row.get("last_synced_at")),
    }
}

const DOCUMENT_COLUMNS: &str = "id, organization_id, source_schema, source_table, source_id, \
     title, raw_content, content_type, metadata_json, content_hash, chunk_count, last_synced_at";

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_document(&self, key: &DocumentKey) -> Result<Option<IndexedDocument>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM indexed_documents \
             WHERE organization_id = ? AND source_schema = ? AND source_table = ? AND source_id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(&key.organization_id)
        .bind(&key.source_schema)
        .bind(&key.source_table)
        .bind(&key.source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_document))
    }

    async fn replace_document(
        &self,
        doc: &IndexedDocument,
        chunks: &[DocumentChunk],
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(&doc.metadata)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO indexed_documents (id, organization_id, source_schema, source_table,
                                           source_id, title, raw_content, content_type,
                                           metadata_json, content_hash, chunk_count,
                                           last_synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(organization_id, source_schema, source_table, source_id) DO UPDATE SET
                title = excluded.title,
                raw_content = excluded.raw_content,
                content_type = excluded.content_type,
                metadata_json = excluded.metadata_json,
                content_hash = excluded.content_hash,
                chunk_count = excluded.chunk_count,
                last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.key.organization_id)
        .bind(&doc.key.source_schema)
        .bind(&doc.key.source_table)
        .bind(&doc.key.source_id)
        .bind(&doc.title)
        .bind(&doc.raw_content)
        .bind(&doc.content_type)
        .bind(&metadata_json)
        .bind(&doc.content_hash)
        .bind(doc.chunk_count as i64)
        .bind(doc.last_synced_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO document_chunks (id, document_id, organization_id, content_type,
                                             source_label, text, embedding, chunk_index,
                                             total_chunks, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_entity_id)
            .bind(&chunk.organization_id)
            .bind(&chunk.content_type)
            .bind(&chunk.source_label)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.chunk_index as i64)
            .bind(chunk.total_chunks as i64)
            .bind(chunk.created_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, key: &DocumentKey) -> Result<Option<IndexedDocument>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM indexed_documents \
             WHERE organization_id = ? AND source_schema = ? AND source_table = ? AND source_id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(&key.organization_id)
        .bind(&key.source_schema)
        .bind(&key.source_table)
        .bind(&key.source_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(doc) = row.as_ref().map(row_to_document) else {
            return Ok(None);
        };

        // Chunks go with the document via ON DELETE CASCADE.
        sqlx::query("DELETE FROM indexed_documents WHERE id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(doc))
    }

    async fn document_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, organization_id, content_type, source_label, text, \
             embedding, chunk_index, total_chunks, created_at \
             FROM document_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentChunk {
                id: row.get("id"),
                source_entity_id: row.get("document_id"),
                organization_id: row.get("organization_id"),
                content_type: row.get("content_type"),
                source_label: row.get("source_label"),
                text: row.get("text"),
                embedding: blob_to_vec(&row.get::<Vec<u8>, _>("embedding")),
                chunk_index: row.get::<i64, _>("chunk_index") as usize,
                total_chunks: row.get::<i64, _>("total_chunks") as usize,
                created_at: from_millis(row.get("created_at")),
            })
            .collect())
    }

    async fn stats(&self, organization_id: &str) -> Result<IndexStats> {
        let rows = sqlx::query(
            "SELECT content_type, COUNT(*) AS cnt, MAX(last_synced_at) AS last_sync \
             FROM indexed_documents WHERE organization_id = ? \
             GROUP BY content_type ORDER BY content_type",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = IndexStats::default();
        for row in &rows {
            let count: i64 = row.get("cnt");
            let last: i64 = row.get("last_sync");
            stats.total_documents += count as u64;
            stats
                .by_content_type
                .insert(row.get("content_type"), count as u64);
            let last = from_millis(last);
            if stats.last_synced_at.map_or(true, |t| last > t) {
                stats.last_synced_at = Some(last);
            }
        }

        let chunks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE organization_id = ?")
                .bind(organization_id)
                .fetch_one(&self.pool)
                .await?;
        stats.total_chunks = chunks as u64;

        Ok(stats)
    }
}

pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, turn: &ConversationTurn) -> Result<()> {
        sqlx::query(
            "INSERT INTO conversation_turns \
             (session_id, organization_id, user_id, role, content, metadata_json, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&turn.session_id)
        .bind(&turn.organization_id)
        .bind(&turn.user_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(serde_json::to_string(&turn.metadata)?)
        .bind(turn.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        // Newest first, then reversed; the row id breaks timestamp ties.
        let rows = sqlx::query(
            "SELECT session_id, organization_id, user_id, role, content, metadata_json, created_at \
             FROM conversation_turns WHERE session_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows.iter().rev() {
            let role: String = row.get("role");
            turns.push(ConversationTurn {
                session_id: row.get("session_id"),
                organization_id: row.get("organization_id"),
                user_id: row.get("user_id"),
                role: Role::parse(&role)
                    .with_context(|| format!("unknown role in conversation_turns: {}", role))?,
                content: row.get("content"),
                metadata: serde_json::from_str(row.get::<&str, _>("metadata_json"))
                    .unwrap_or(serde_json::Value::Null),
                created_at: from_millis(row.get("created_at")),
            });
        }
        Ok(turns)
    }

    async fn clear(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, organization_id, content_type, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    organization_id = excluded.organization_id,
                    content_type = excluded.content_type,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(&record.metadata.organization_id)
            .bind(&record.metadata.content_type)
            .bind(serde_json::to_string(&record.metadata)?)
            .bind(vec_to_blob(&record.values))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        let content_types = filter
            .content_types
            .as_deref()
            .filter(|types| !types.is_empty());

        let mut sql = String::from(
            "SELECT id, metadata_json, embedding FROM vectors WHERE organization_id = ?",
        );
        if let Some(types) = content_types {
            let placeholders = vec!["?"; types.len()].join(", ");
            sql.push_str(&format!(" AND content_type IN ({})", placeholders));
        }

        let mut query = sqlx::query(&sql).bind(&filter.organization_id);
        if let Some(types) = content_types {
            for t in types {
                query = query.bind(t);
            }
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata: VectorMetadata =
                serde_json::from_str(row.get::<&str, _>("metadata_json"))
                    .context("corrupt vector metadata")?;
            let values = blob_to_vec(&row.get::<Vec<u8>, _>("embedding"));
            matches.push(VectorMatch {
                id: row.get("id"),
                score: cosine_similarity(vector, &values),
                metadata,
            });
        }

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
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM vectors WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
