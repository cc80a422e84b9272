//! Query-time similarity search and context assembly.
//!
//! [`RetrievalService::search`] embeds the query once and asks the vector
//! store for the top hits inside one organization, optionally narrowed to
//! some content types. Hits come back in the store's own similarity order;
//! nothing is re-ranked.
//!
//! [`RetrievalService::retrieve`] adds overview augmentation on top: when the
//! query reads as aggregate or personal, the organization's overview
//! pseudo-document is fetched with the same query vector and prepended, and
//! regular hits from the overview document itself are dropped.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use org_assist_core::context::build_context;
use org_assist_core::embedding::Embedder;
use org_assist_core::intent::{classify, QueryFlags};
use org_assist_core::models::{RetrievedChunk, OVERVIEW_CONTENT_TYPE};
use org_assist_core::store::{VectorFilter, VectorStore};

use crate::config::RetrievalConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub organization_id: String,
    pub query: String,
    #[serde(default)]
    pub content_types: Option<Vec<String>>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Hits plus the rendered context block handed to the model.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<RetrievedChunk>,
    pub context: String,
    pub flags: QueryFlags,
}

pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vectors,
            config,
        }
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<RetrievedChunk>> {
        let vector = self
            .embedder
            .embed_query(&req.query)
            .await
            .context("embedding query")?;
        let mut filter = VectorFilter::organization(&req.organization_id);
        if let Some(types) = &req.content_types {
            filter = filter.with_content_types(types.clone());
        }
        self.query(&vector, req.top_k.unwrap_or(self.config.top_k), &filter)
            .await
    }

    pub async fn retrieve(&self, organization_id: &str, query: &str) -> Result<Retrieval> {
        let flags = classify(query);
        let vector = self
            .embedder
            .embed_query(query)
            .await
            .context("embedding query")?;

        let hits = self
            .query(
                &vector,
                self.config.top_k,
                &VectorFilter::organization(organization_id),
            )
            .await?;

        let hits = if flags.wants_overview() && self.config.overview_k > 0 {
            let overview = self
                .query(
                    &vector,
                    self.config.overview_k,
                    &VectorFilter::organization(organization_id)
                        .with_content_types(vec![OVERVIEW_CONTENT_TYPE.to_string()]),
                )
                .await?;
            merge_overview(overview, hits)
        } else {
            hits
        };

        tracing::debug!(
            organization_id,
            hits = hits.len(),
            aggregate = flags.aggregate,
            personal = flags.personal,
            "retrieved context"
        );

        Ok(Retrieval {
            context: build_context(&hits),
            hits,
            flags,
        })
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<RetrievedChunk>> {
        let matches = self
            .vectors
            .query(vector, top_k, filter)
            .await
            .context("querying vector store")?;
        Ok(matches.into_iter().map(|m| m.into_retrieved()).collect())
    }
}

/// Overview hits first, then regular hits whose source is not already present.
fn merge_overview(overview: Vec<RetrievedChunk>, hits: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    let documents: HashSet<String> = overview.iter().map(|h| h.document_id.clone()).collect();
    overview
        .into_iter()
        .chain(hits.into_iter().filter(|h| !documents.contains(&h.document_id)))
        .collect()
}
