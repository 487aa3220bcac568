pub mod config;
pub mod db;
pub mod discovery;
pub mod handlers;
pub mod models;
pub mod scanner;
pub mod scheduler;
pub mod state;

use axum::routing::get;
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        // Servers
        .route("/api/v1/servers", get(handlers::list_servers))
        .route("/api/v1/servers/{id}", get(handlers::get_server))
        .route("/api/v1/servers/{id}/scans", get(handlers::server_scans))
        .route(
            "/api/v1/servers/{id}/mutations",
            get(handlers::server_mutations),
        )
        // Search / aggregates
        .route("/api/v1/search", get(handlers::search_servers))
        .route("/api/v1/stats", get(handlers::stats))
        .route("/api/v1/recent/critical", get(handlers::recent_critical))
        .route("/api/v1/recent/mutations", get(handlers::recent_mutations))
        // Shared state
        .with_state(state)
}
