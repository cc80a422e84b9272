//! Vector store providers.
//!
//! [`create_vector_store`] selects the backend from `[vector_store]`:
//! the local `sqlite` table (see [`crate::sqlite_store::SqliteVectorStore`])
//! or a Pinecone index over its REST API.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use org_assist_core::store::{VectorFilter, VectorMatch, VectorMetadata, VectorRecord, VectorStore};

use crate::config::VectorStoreConfig;
use crate::http::{is_transient, RetryPolicy};
use crate::sqlite_store::SqliteVectorStore;

/// Pinecone serverless index client.
///
/// All three operations are idempotent, so each is retried on transient
/// failures under the configured policy.
pub struct PineconeVectorStore {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
    retry: RetryPolicy,
}

impl PineconeVectorStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let host = config
            .url
            .clone()
            .ok_or_else(|| anyhow!("vector_store.url required for Pinecone provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            namespace: config.namespace.clone(),
            retry: RetryPolicy::new(config.max_retries, Duration::from_millis(500)),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.host, path);
        let mut last_err = None;

        for attempt in 0..=self.retry.max_retries {
            self.retry.wait(attempt).await;

            let resp = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await?;
                        if text.trim().is_empty() {
                            return Ok(Value::Null);
                        }
                        return serde_json::from_str(&text)
                            .with_context(|| format!("invalid JSON from {}", path));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if is_transient(status) {
                        tracing::warn!(%status, attempt, path, "vector store request failed, retrying");
                        last_err = Some(anyhow!("Pinecone error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("Pinecone error {}: {}", status, body_text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, path, "vector store request failed, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("vector store request failed after retries")))
    }

    fn with_namespace(&self, mut body: Value) -> Value {
        if let (Some(ns), Some(obj)) = (&self.namespace, body.as_object_mut()) {
            obj.insert("namespace".to_string(), json!(ns));
        }
        body
    }
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a VectorMetadata,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<VectorMetadata>,
}

/// Pinecone metadata filter; keys match [`VectorMetadata`]'s camelCase names.
fn filter_json(filter: &VectorFilter) -> Value {
    let mut clauses = serde_json::Map::new();
    clauses.insert(
        "organizationId".to_string(),
        json!({ "$eq": filter.organization_id }),
    );
    if let Some(types) = filter.content_types.as_ref().filter(|t| !t.is_empty()) {
        clauses.insert("contentType".to_string(), json!({ "$in": types }));
    }
    Value::Object(clauses)
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        // Pinecone caps upsert requests; 100 vectors stays well under it.
        for batch in records.chunks(100) {
            let vectors: Vec<UpsertVector> = batch
                .iter()
                .map(|r| UpsertVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: &r.metadata,
                })
                .collect();
            let body = self.with_namespace(json!({ "vectors": vectors }));
            self.post("/vectors/upsert", &body).await?;
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        let body = self.with_namespace(json!({
            "vector": vector,
            "topK": top_k,
            "filter": filter_json(filter),
            "includeMetadata": true,
            "includeValues": false,
        }));
        let resp: QueryResponse = serde_json::from_value(self.post("/query", &body).await?)
            .context("invalid Pinecone query response")?;

        Ok(resp
            .matches
            .into_iter()
            .filter_map(|m| {
                let metadata = m.metadata?;
                Some(VectorMatch {
                    id: m.id,
                    score: m.score,
                    metadata,
                })
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for batch in ids.chunks(1000) {
            let body = self.with_namespace(json!({ "ids": batch }));
            self.post("/vectors/delete", &body).await?;
        }
        Ok(())
    }
}

pub fn create_vector_store(
    config: &VectorStoreConfig,
    pool: &SqlitePool,
) -> Result<Arc<dyn VectorStore>> {
    match config.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteVectorStore::new(pool.clone()))),
        "pinecone" => Ok(Arc::new(PineconeVectorStore::new(config)?)),
        other => bail!("Unknown vector store provider: {}", other),
    }
}
