//! HTTP query API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Welcome message |
//! | `GET`  | `/health` | Version and active index generation |
//! | `POST` | `/search` | Ranked, paginated search |
//! | `POST` | `/ingest` | Run one ingest pass |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid request: query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `index_unavailable` (503),
//! `timeout` (408), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use mdseek_core::models::{RankedResult, SearchOutcome};
use mdseek_core::search::SearchError;

use crate::ingest::IngestReport;
use crate::service::{DocService, QueryError};

#[derive(Clone)]
struct AppState {
    service: Arc<DocService>,
}

/// Build the router. Exposed separately from [`run_server`] so it can be
/// driven in-process.
pub fn router(service: Arc<DocService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/ingest", post(handle_ingest))
        .layer(cors)
        .with_state(AppState { service })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(service: Arc<DocService>) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    println!("mdseek listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
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

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let message = err.to_string();
        let (status, code) = match err {
            QueryError::Search(SearchError::Validation(_)) => (StatusCode::BAD_REQUEST, "bad_request"),
            QueryError::Search(SearchError::IndexUnavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable")
            }
            QueryError::Search(SearchError::QueryFailed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            QueryError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "timeout"),
        };
        AppError {
            status,
            code,
            message,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to mdseek. POST /search with {\"query\": \"...\"} to search the corpus.",
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Active index generation, `null` before the first successful ingest.
    generation: Option<u64>,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let current = state.service.engine().index().current();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        generation: current.as_ref().map(|g| g.id),
        documents: current.as_ref().map_or(0, |g| g.index.len()),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    size: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RankedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Results(results) => SearchResponse {
                results,
                message: None,
            },
            SearchOutcome::NoResults => SearchResponse {
                results: Vec::new(),
                message: Some("no results"),
            },
        }
    }
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload?;
    let outcome = state
        .service
        .search(&req.query, req.page, req.size)
        .await
        .map_err(|e| {
            tracing::warn!(query = %req.query, error = %e, "search failed");
            AppError::from(e)
        })?;

    Ok(Json(outcome.into()))
}

// ============ POST /ingest ============

async fn handle_ingest(State(state): State<AppState>) -> Result<Json<IngestReport>, AppError> {
    let report = state
        .service
        .ingest()
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;

    if !report.ok {
        return Err(internal(report.summary()));
    }
    Ok(Json(report))
}
