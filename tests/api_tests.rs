//! Integration tests for the read-only JSON API, driven through the real
//! router without binding a network port.
//!
//! These need a Postgres instance: set DATABASE_URL to run them. Without it
//! every test skips early so the rest of the suite stays usable on machines
//! with no database.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mcpsek_backend::db::Db;
use mcpsek_backend::state::AppState;

/// Helper: build a fresh AppState backed by a test Postgres database, or
/// `None` when DATABASE_URL is not set.
async fn test_state() -> Option<AppState> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };
    let db = Db::connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to run migrations");
    Some(AppState::new(db))
}

/// Helper: build a router from a test state.
fn app(state: AppState) -> axum::Router {
    mcpsek_backend::create_router(state)
}

/// Helper: issue a GET against the router.
async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Helper: collect a response body into a serde_json::Value.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/health
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_returns_200_with_expected_fields() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["uptime_seconds"].is_u64());
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/v1/servers
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn list_servers_returns_paginated_envelope() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/servers").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["data"].is_array());
    assert!(json["meta"]["total"].as_i64().unwrap() >= 0);
    assert_eq!(json["meta"]["page"], 1);
    assert_eq!(json["meta"]["per_page"], 20);
    assert!(json["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn list_servers_honours_pagination_params() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/servers?page=2&per_page=5").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["meta"]["page"], 2);
    assert_eq!(json["meta"]["per_page"], 5);
}

#[tokio::test]
async fn oversized_per_page_is_clamped() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/servers?per_page=5000").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["meta"]["per_page"], 100);
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/v1/servers/{id}
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_server_returns_404_error_envelope() {
    let Some(state) = test_state().await else { return };
    let uri = format!("/api/v1/servers/{}", uuid::Uuid::new_v4());
    let response = get(app(state), &uri).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "not_found");
    assert_eq!(json["error"]["message"], "Server not found");
}

#[tokio::test]
async fn malformed_server_id_returns_400() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/servers/not-a-uuid").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scans_and_mutations_for_unknown_server_are_empty_lists() {
    let Some(state) = test_state().await else { return };
    let uri = format!("/api/v1/servers/{}/scans", uuid::Uuid::new_v4());
    let response = get(app(state.clone()), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
    assert_eq!(json["meta"]["total"], 0);

    let uri = format!("/api/v1/servers/{}/mutations", uuid::Uuid::new_v4());
    let response = get(app(state), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/v1/search
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn search_with_blank_query_returns_400_error_envelope() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/search?q=").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"]["message"].as_str().unwrap().contains("'q'"));
}

#[tokio::test]
async fn search_with_query_returns_envelope() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/search?q=filesystem").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["data"].is_array());
    assert!(json["meta"]["total"].as_i64().unwrap() >= 0);
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/v1/stats and /api/v1/recent/*
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn stats_reports_all_counters() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/v1/stats").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert!(data["total_servers"].as_i64().unwrap() >= 0);
    assert!(data["total_scans"].as_i64().unwrap() >= 0);
    assert!(data["critical_findings"].as_i64().unwrap() >= 0);
    assert!(data["total_mutations"].as_i64().unwrap() >= 0);
    assert!(data["avg_trust_score"].is_f64());
}

#[tokio::test]
async fn recent_endpoints_return_arrays() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state.clone()), "/api/v1/recent/critical").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].is_array());

    let response = get(app(state), "/api/v1/recent/mutations?limit=5").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].is_array());
}

// ═══════════════════════════════════════════════════════════════════════════
//  404 for unknown routes
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_route_returns_404() {
    let Some(state) = test_state().await else { return };
    let response = get(app(state), "/api/nonexistent").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
