//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question or run an action request |
//! | `POST` | `/search` | Raw similarity search inside one organization |
//! | `POST` | `/index` | Index or re-index one source entity |
//! | `POST` | `/index/batch` | Index many entities; per-document failures are listed |
//! | `POST` | `/remove` | Remove an indexed entity |
//! | `GET`  | `/stats/{org_id}` | Indexed counts by content type |
//! | `GET`  | `/sessions/{id}/history?limit=` | Session turns, oldest first |
//! | `DELETE` | `/sessions/{id}` | Clear a session |
//! | `GET`  | `/tools/list` | Action catalog with parameter schemas |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! A `/query` that fails inside the engine is still a 200: the failure is
//! reported in the response's own `error` field.
//!
//! # Shutdown
//!
//! Ctrl-C cancels in-flight agent runs through a shared
//! [`CancellationToken`] and then drains the server.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use org_assist_core::actions::{catalog, ToolCategory};
use org_assist_core::error::EngineError;
use org_assist_core::models::{
    BatchOutcome, ConversationTurn, DocumentKey, IndexDocument, IndexOutcome, IndexStats,
    RetrievedChunk,
};

use crate::app::AppContext;
use crate::config::Config;
use crate::engine::{QueryRequest, QueryResponse};
use crate::retrieval::SearchRequest;

#[derive(Clone)]
struct AppState {
    ctx: Arc<AppContext>,
    shutdown: CancellationToken,
}

/// Build the context from `config` and serve until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::from_config(config).await?);
    let shutdown = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "org-assist listening");

    let app = router(ctx, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

/// All routes over an already-built context.
pub fn router(ctx: Arc<AppContext>, shutdown: CancellationToken) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/search", post(handle_search))
        .route("/index", post(handle_index))
        .route("/index/batch", post(handle_index_batch))
        .route("/remove", post(handle_remove))
        .route("/stats/{org_id}", get(handle_stats))
        .route("/sessions/{id}/history", get(handle_history))
        .route("/sessions/{id}", delete(handle_clear_session))
        .route("/tools/list", get(handle_list_tools))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { ctx, shutdown })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Validation failures are the caller's fault; everything else is ours.
fn classify(err: anyhow::Error) -> AppError {
    let message = EngineError::describe(&err);
    if message.contains("must not be empty")
        || message.contains("must be")
        || message.contains("unknown tool category")
    {
        bad_request(message)
    } else {
        internal(message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let cancel = state.shutdown.child_token();
    let response = state
        .ctx
        .engine
        .query(&request, &cancel)
        .await
        .map_err(classify)?;
    Ok(Json(response))
}

// ============ POST /search ============

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedChunk>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if request.organization_id.trim().is_empty() {
        return Err(bad_request("organizationId must not be empty"));
    }
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = state
        .ctx
        .retrieval
        .search(&request)
        .await
        .map_err(classify)?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /index, /index/batch, /remove ============

async fn handle_index(
    State(state): State<AppState>,
    Json(doc): Json<IndexDocument>,
) -> Result<Json<IndexOutcome>, AppError> {
    let outcome = state
        .ctx
        .indexing
        .index_document(&doc)
        .await
        .map_err(classify)?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct BatchRequest {
    documents: Vec<IndexDocument>,
}

async fn handle_index_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> Json<BatchOutcome> {
    Json(state.ctx.indexing.index_documents(&batch.documents).await)
}

#[derive(Serialize)]
struct RemoveResponse {
    removed: bool,
}

async fn handle_remove(
    State(state): State<AppState>,
    Json(key): Json<DocumentKey>,
) -> Result<Json<RemoveResponse>, AppError> {
    if key.organization_id.trim().is_empty() {
        return Err(bad_request("organizationId must not be empty"));
    }
    let removed = state
        .ctx
        .indexing
        .remove_document(&key)
        .await
        .map_err(classify)?;
    Ok(Json(RemoveResponse { removed }))
}

// ============ GET /stats/{org_id} ============

async fn handle_stats(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<IndexStats>, AppError> {
    let stats = state
        .ctx
        .indexing
        .get_stats(&org_id)
        .await
        .map_err(classify)?;
    Ok(Json(stats))
}

// ============ Sessions ============

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    session_id: String,
    turns: Vec<ConversationTurn>,
}

async fn handle_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(state.ctx.config.sessions.history_limit);
    if limit == 0 {
        return Err(bad_request("limit must be >= 1"));
    }
    let turns = state
        .ctx
        .engine
        .history(&session_id, limit)
        .await
        .map_err(classify)?;
    Ok(Json(HistoryResponse { session_id, turns }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    session_id: String,
    deleted: u64,
}

async fn handle_clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let deleted = state
        .ctx
        .engine
        .clear_session(&session_id)
        .await
        .map_err(classify)?;
    if deleted == 0 {
        return Err(not_found(format!("no turns stored for session: {}", session_id)));
    }
    Ok(Json(ClearResponse {
        session_id,
        deleted,
    }))
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: &'static str,
    description: &'static str,
    category: ToolCategory,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools() -> Json<ToolListResponse> {
    let tools = catalog()
        .iter()
        .map(|spec| ToolInfo {
            name: spec.name,
            description: spec.description,
            category: spec.category(),
            parameters: spec.schema(),
        })
        .collect();
    Json(ToolListResponse { tools })
}
