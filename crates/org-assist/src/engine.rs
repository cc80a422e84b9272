//! Query entry point.
//!
//! One request runs:
//!
//! 1. scope guard (a rejection persists both turns and returns the refusal),
//! 2. recent session history,
//! 3. the user turn is persisted,
//! 4. routing to the RAG answerer or the agent loop,
//! 5. the assistant turn is persisted if an answer was produced.
//!
//! Conversation-store failures are logged and never fail the answer.
//! Retrieval, model and cancellation failures come back as an `error`
//! object on the response with no assistant turn stored, so the request
//! can be retried safely.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use org_assist_core::actions::ToolCategory;
use org_assist_core::error::EngineError;
use org_assist_core::intent::{route, Route};
use org_assist_core::models::{ConversationTurn, Identity, RetrievedChunk, Role};
use org_assist_core::scope::{self, ScopeVerdict, REFUSAL};
use org_assist_core::store::ConversationStore;

use crate::agent::AgentOrchestrator;
use crate::rag::RagAnswerer;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub organization_id: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub enabled_tool_categories: Option<Vec<String>>,
}

impl QueryRequest {
    pub fn identity(&self) -> Identity {
        Identity {
            organization_id: self.organization_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// Check required fields and parse the tool categories.
    pub fn validate(&self) -> Result<Option<Vec<ToolCategory>>> {
        if self.organization_id.trim().is_empty() {
            bail!("organizationId must not be empty");
        }
        if self.user_id.trim().is_empty() {
            bail!("userId must not be empty");
        }
        if self.query.trim().is_empty() {
            bail!("query must not be empty");
        }
        let Some(names) = &self.enabled_tool_categories else {
            return Ok(None);
        };
        let mut categories = Vec::with_capacity(names.len());
        for name in names {
            match ToolCategory::parse(name) {
                Some(c) => categories.push(c),
                None => bail!("unknown tool category: {}", name),
            }
        }
        Ok(Some(categories))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub success: bool,
    pub tools_used: Vec<String>,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl From<&EngineError> for ErrorInfo {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub answer: String,
    pub session_id: String,
    pub is_out_of_scope: bool,
    pub is_action_response: bool,
    pub sources: Vec<RetrievedChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_result: Option<ActionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl QueryResponse {
    fn new(session_id: String, answer: String) -> Self {
        Self {
            answer,
            session_id,
            is_out_of_scope: false,
            is_action_response: false,
            sources: Vec::new(),
            action_result: None,
            error: None,
        }
    }
}

pub struct QueryEngine {
    rag: RagAnswerer,
    agent: AgentOrchestrator,
    conversations: Arc<dyn ConversationStore>,
    history_limit: usize,
}

impl QueryEngine {
    pub fn new(
        rag: RagAnswerer,
        agent: AgentOrchestrator,
        conversations: Arc<dyn ConversationStore>,
        history_limit: usize,
    ) -> Self {
        Self {
            rag,
            agent,
            conversations,
            history_limit,
        }
    }

    /// Answer one query. Only invalid input is an `Err`; every other
    /// outcome is described by the response.
    pub async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        let categories = request.validate()?;
        let identity = request.identity();
        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let query = request.query.trim();

        if let ScopeVerdict::OutOfScope { matched } = scope::check(query) {
            tracing::info!(session_id = %session_id, term = %matched, "query rejected by scope guard");
            let flag = json!({ "outOfScope": true });
            self.persist(
                ConversationTurn::new(&identity, &session_id, Role::User, query)
                    .with_metadata(flag.clone()),
            )
            .await;
            self.persist(
                ConversationTurn::new(&identity, &session_id, Role::Assistant, REFUSAL)
                    .with_metadata(flag),
            )
            .await;
            let mut response = QueryResponse::new(session_id, REFUSAL.to_string());
            response.is_out_of_scope = true;
            return Ok(response);
        }

        let history = match self
            .conversations
            .history(&session_id, self.history_limit)
            .await
        {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %EngineError::describe(&e), "failed to load history");
                Vec::new()
            }
        };

        self.persist(ConversationTurn::new(&identity, &session_id, Role::User, query))
            .await;

        let path = route(query);
        tracing::info!(session_id = %session_id, route = ?path, history = history.len(), "routing query");

        let mut response = QueryResponse::new(session_id.clone(), String::new());
        let outcome = match path {
            Route::PureRag => self
                .rag
                .answer(&identity, query, &history, cancel)
                .await
                .map(|answer| {
                    response.sources = answer.sources;
                    (answer.answer, json!({ "route": "rag" }))
                }),
            Route::AgentLoop => self
                .agent
                .run(&identity, query, &history, categories.as_deref(), cancel)
                .await
                .map(|outcome| {
                    response.is_action_response = true;
                    let metadata = json!({
                        "route": "agent",
                        "toolsUsed": outcome.tools_used,
                        "iterations": outcome.iterations,
                    });
                    response.action_result = Some(ActionSummary {
                        success: outcome.success,
                        tools_used: outcome.tools_used,
                        iterations: outcome.iterations,
                        code: outcome.code.map(str::to_string),
                    });
                    (outcome.answer, metadata)
                }),
        };

        match outcome {
            Ok((answer, metadata)) => {
                self.persist(
                    ConversationTurn::new(&identity, &session_id, Role::Assistant, &answer)
                        .with_metadata(metadata),
                )
                .await;
                response.answer = answer;
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, code = err.code(), error = %err, "query failed");
                response.is_action_response = path == Route::AgentLoop;
                response.answer = format!("An error occurred: {}", err);
                response.error = Some(ErrorInfo::from(&err));
            }
        }
        Ok(response)
    }

    pub async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        self.conversations.history(session_id, limit).await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<u64> {
        self.conversations.clear(session_id).await
    }

    async fn persist(&self, turn: ConversationTurn) {
        if let Err(e) = self.conversations.append(&turn).await {
            let err = EngineError::PersistenceFailure(EngineError::describe(&e));
            tracing::warn!(session_id = %turn.session_id, role = turn.role.as_str(), error = %err, "failed to store conversation turn");
        }
    }
}
