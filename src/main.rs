use std::sync::Arc;

use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tokio_util::sync::CancellationToken;

use mcpsek_backend::config::Config;
use mcpsek_backend::db::Db;
use mcpsek_backend::scanner::Scanner;
use mcpsek_backend::scheduler::Scheduler;
use mcpsek_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Config::load()?;

    tokio::fs::create_dir_all(&config.clone_dir).await?;

    let db = Db::connect(&config.database_url).await?;
    db.migrate().await?;
    tracing::info!("startup: database connected and migrated");

    let scanner = Arc::new(Scanner::new(config.clone_dir.clone(), db.clone()));
    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        scanner,
        config.github_token.clone(),
        config.scan_workers,
        config.scan_interval,
        config.discovery_interval,
    ));

    let cancel = CancellationToken::new();
    let scheduler_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    // Rate limiting: API_RATE_LIMIT requests per minute per client IP.
    let replenish_ms = (60_000 / config.api_rate_limit).max(1);
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(config.api_rate_limit as u32)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?;

    let state = AppState::new(db);
    let app = mcpsek_backend::create_router(state)
        .layer(GovernorLayer::new(governor_conf))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let addr = config.socket_addr()?;
    tracing::info!("mcpsek listening on http://{addr}");
    tracing::info!(
        "scanner: {} workers, scan interval {:?}, discovery interval {:?}",
        config.scan_workers,
        config.scan_interval,
        config.discovery_interval
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            // Stop new clones and DB work before the listener drains.
            cancel.cancel();
        }
    })
    .await?;

    cancel.cancel();
    let _ = scheduler_task.await;

    tracing::info!("mcpsek stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
