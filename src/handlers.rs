//! Read-only JSON API over the scan store.
//!
//! Every endpoint is a pure query; scanning and discovery are driven solely
//! by the scheduler.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::{ApiResponse, HealthResponse, Meta, Mutation, Pagination, Scan, Server, Stats};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Central API error. Full detail is logged server-side; clients get a
/// sanitized code + message pair.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) => m.clone(),
            // Never leak query or pool internals.
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        tracing::error!("api: {} ({}): {}", self.code(), status.as_u16(), self);

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.client_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParam {
    pub limit: Option<u32>,
}

impl LimitParam {
    fn resolve(&self) -> i64 {
        i64::from(self.limit.unwrap_or(20).clamp(1, 100))
    }
}

fn paged<T: Serialize>(data: T, total: i64, page: u32, per_page: u32) -> ApiResponse<T> {
    ApiResponse {
        data,
        meta: Some(Meta {
            total,
            page,
            per_page,
            timestamp: chrono::Utc::now(),
        }),
    }
}

fn plain<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse { data, meta: None }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.health().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!("api: health check found database unreachable: {err}");
            "unreachable"
        }
    };

    Json(HealthResponse {
        status: if database == "ok" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database: database.to_string(),
    })
}

pub async fn list_servers(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<Vec<Server>>>, ApiError> {
    let (page, per_page) = pagination.resolve();
    let (servers, total) = state
        .db
        .list_servers(i64::from(per_page), pagination.offset())
        .await?;
    Ok(Json(paged(servers, total, page, per_page)))
}

pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let server = state
        .db
        .get_server(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Server not found".to_string()))?;

    let latest_scan = state.db.latest_scan_for_server(id).await?;

    Ok(Json(plain(json!({
        "server": server,
        "latest_scan": latest_scan,
    }))))
}

pub async fn server_scans(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<Vec<Scan>>>, ApiError> {
    let (page, per_page) = pagination.resolve();
    let (scans, total) = state
        .db
        .scan_history(id, i64::from(per_page), pagination.offset())
        .await?;
    Ok(Json(paged(scans, total, page, per_page)))
}

pub async fn server_mutations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<Vec<Mutation>>>, ApiError> {
    let (page, per_page) = pagination.resolve();
    let (mutations, total) = state
        .db
        .mutations_for_server(id, i64::from(per_page), pagination.offset())
        .await?;
    Ok(Json(paged(mutations, total, page, per_page)))
}

pub async fn search_servers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Server>>>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query parameter 'q' is required".to_string()));
    }

    let pagination = Pagination {
        page: params.page,
        per_page: params.per_page,
    };
    let (page, per_page) = pagination.resolve();
    let (servers, total) = state
        .db
        .search_servers(query, i64::from(per_page), pagination.offset())
        .await?;
    Ok(Json(paged(servers, total, page, per_page)))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<ApiResponse<Stats>>, ApiError> {
    Ok(Json(plain(state.db.stats().await?)))
}

pub async fn recent_critical(
    State(state): State<AppState>,
    Query(limit): Query<LimitParam>,
) -> Result<Json<ApiResponse<Vec<Scan>>>, ApiError> {
    let scans = state.db.recent_critical_scans(limit.resolve()).await?;
    Ok(Json(plain(scans)))
}

pub async fn recent_mutations(
    State(state): State<AppState>,
    Query(limit): Query<LimitParam>,
) -> Result<Json<ApiResponse<Vec<Mutation>>>, ApiError> {
    let mutations = state.db.recent_mutations(limit.resolve()).await?;
    Ok(Json(plain(mutations)))
}
