//! Background scheduling: a periodic discovery loop that upserts newly
//! found servers, and a periodic scan loop that drains due servers through
//! a bounded worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::db::Db;
use crate::discovery::{DiscoveredServer, GitHubDiscoverer, NpmDiscoverer, RegistryDiscoverer};
use crate::models::Server;
use crate::scanner::Scanner;

/// Upper bound on servers picked up per scan tick.
const SCAN_BATCH_LIMIT: i64 = 100;

pub struct Scheduler {
    db: Db,
    scanner: Arc<Scanner>,
    npm: NpmDiscoverer,
    github: GitHubDiscoverer,
    registry: RegistryDiscoverer,
    scan_workers: usize,
    scan_interval: Duration,
    discovery_interval: Duration,
}

impl Scheduler {
    pub fn new(
        db: Db,
        scanner: Arc<Scanner>,
        github_token: Option<String>,
        scan_workers: usize,
        scan_interval: Duration,
        discovery_interval: Duration,
    ) -> Self {
        Self {
            db,
            scanner,
            npm: NpmDiscoverer::new(),
            github: GitHubDiscoverer::new(github_token),
            registry: RegistryDiscoverer::new(),
            scan_workers,
            scan_interval,
            discovery_interval,
        }
    }

    /// Run both loops until the token is cancelled. Discovery fires once
    /// immediately so a fresh deployment has something to scan.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            "scheduler: started ({} workers, scan every {:?}, discovery every {:?})",
            self.scan_workers,
            self.scan_interval,
            self.discovery_interval,
        );

        self.run_discovery(&cancel).await;

        let discovery = {
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.discovery_loop(cancel).await }
        };
        let scanning = {
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.scan_loop(cancel).await }
        };

        tokio::join!(discovery, scanning);
        tracing::info!("scheduler: stopped");
    }

    async fn discovery_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.discovery_interval);
        ticker.tick().await; // the immediate first tick; initial discovery already ran

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.run_discovery(&cancel).await,
            }
        }
    }

    /// One discovery tick: every backend runs even if another failed, and
    /// every record is upserted independently.
    async fn run_discovery(&self, cancel: &CancellationToken) {
        tracing::info!("scheduler: running discovery");
        let mut total = 0usize;

        let backends: [(&str, Vec<DiscoveredServer>); 3] = [
            ("npm", self.npm.discover().await),
            ("github", self.github.discover().await),
            ("registry", self.registry.discover().await),
        ];

        for (backend, servers) in backends {
            if cancel.is_cancelled() {
                return;
            }
            let mut upserted = 0usize;
            for server in &servers {
                match self.db.upsert_server(server).await {
                    Ok(_) => upserted += 1,
                    Err(err) => {
                        tracing::warn!(
                            "scheduler: upsert of {} from {backend} failed: {err}",
                            server.source_url
                        );
                    }
                }
            }
            tracing::info!("scheduler: {backend} discovery found {upserted} servers");
            total += upserted;
        }

        tracing::info!("scheduler: discovery complete, {total} servers upserted");
    }

    async fn scan_loop(&self, cancel: CancellationToken) {
        // An immediate first batch, then the periodic cadence.
        self.run_scan_batch(&cancel).await;

        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.run_scan_batch(&cancel).await,
            }
        }
    }

    /// One scan tick: fetch due servers and drain them through
    /// `scan_workers` workers sharing a single pre-loaded channel.
    async fn run_scan_batch(&self, cancel: &CancellationToken) {
        let servers = match self.db.servers_due_for_scan(SCAN_BATCH_LIMIT).await {
            Ok(servers) => servers,
            Err(err) => {
                tracing::error!("scheduler: fetching due servers failed: {err}");
                return;
            }
        };

        if servers.is_empty() {
            tracing::debug!("scheduler: no servers due for scanning");
            return;
        }

        tracing::info!(
            "scheduler: scanning {} servers with {} workers",
            servers.len(),
            self.scan_workers
        );

        let (tx, rx) = mpsc::channel::<Server>(servers.len());
        for server in servers {
            // Channel capacity equals batch size; this cannot block.
            let _ = tx.send(server).await;
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(self.scan_workers);

        for _ in 0..self.scan_workers {
            let rx = rx.clone();
            let db = self.db.clone();
            let scanner = self.scanner.clone();
            let cancel = cancel.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(server) = job else { break };
                    if cancel.is_cancelled() {
                        break;
                    }
                    scan_one(&db, &scanner, &cancel, server).await;
                }
            }));
        }

        for worker in workers {
            let _ = worker.await;
        }

        tracing::info!("scheduler: scan batch complete");
    }
}

async fn scan_one(db: &Db, scanner: &Scanner, cancel: &CancellationToken, server: Server) {
    if let Err(err) = db.update_scan_status(server.id, "scanning", None).await {
        tracing::error!("scheduler: marking {} as scanning failed: {err}", server.name);
        return;
    }

    match scanner.scan(cancel, server.id, &server.source_url).await {
        Ok(outcome) => {
            tracing::info!(
                "scheduler: scan of {} complete (score {}, {} tools, {}ms)",
                server.name,
                outcome.trust_score,
                outcome.tools_found,
                outcome.duration_ms
            );
        }
        Err(err) => {
            tracing::warn!("scheduler: scan of {} failed: {err}", server.name);
            let message = err.to_string();
            if let Err(db_err) = db
                .update_scan_status(server.id, "failed", Some(&message))
                .await
            {
                tracing::error!(
                    "scheduler: recording failure for {} failed: {db_err}",
                    server.name
                );
            }
        }
    }
}
