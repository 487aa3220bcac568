//! Security scanning engine: clone a server's source, run the three checks,
//! score the result, persist the snapshot and detect tool mutations.

pub mod auth;
pub mod clone;
pub mod exposure;
pub mod integrity;
pub mod mutation;
pub mod patterns;
pub mod score;
pub mod walk;

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::Db;
use crate::models::{NewScan, NewToolDefinition};
use auth::AuthReport;
use clone::CloneManager;
use exposure::ExposureReport;
use integrity::{ExtractedTool, IntegrityReport};

/// Outcome of one security check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Critical,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warning => "warning",
            CheckStatus::Critical => "critical",
            CheckStatus::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unsupported repository URL format: {0}")]
    UnsupportedUrl(String),
    #[error("git {op} failed: {detail}")]
    Git { op: &'static str, detail: String },
    #[error("git {op} timed out after {seconds}s")]
    GitTimeout { op: &'static str, seconds: u64 },
    #[error("repository too large: {size_mb} MB (max 500 MB)")]
    OversizedRepository { size_mb: u64 },
    #[error("scan cancelled")]
    Cancelled,
    #[error("check execution failed: {0}")]
    CheckFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Summary handed back to the scheduler for logging.
#[derive(Debug)]
pub struct ScanOutcome {
    pub trust_score: i32,
    pub tools_found: usize,
    pub duration_ms: i32,
}

pub struct Scanner {
    clones: CloneManager,
    db: Db,
}

impl Scanner {
    pub fn new(clone_dir: PathBuf, db: Db) -> Self {
        Self {
            clones: CloneManager::new(clone_dir),
            db,
        }
    }

    /// Run one scan end-to-end. On success the server row is marked
    /// completed with its new score; any error leaves persistence to the
    /// caller (the scheduler marks the server failed).
    pub async fn scan(
        &self,
        cancel: &CancellationToken,
        server_id: Uuid,
        source_url: &str,
    ) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();

        let repo = self.clones.fetch(cancel, source_url).await?;
        let ((integrity_report, tools), auth_report, exposure_report) = run_checks(&repo).await?;

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let trust_score = score::compute_trust_score(
            integrity_report.status,
            auth_report.status,
            exposure_report.status,
        );
        let tools_hash = compute_tools_hash(&tools);
        let duration_ms = started.elapsed().as_millis() as i32;

        // Snapshot the previous scan's tool set before this scan's rows
        // land; per-server scans are sequential so this cannot race.
        let prior_tools = self.db.latest_tool_set(server_id).await?;

        let scan = NewScan {
            server_id,
            tool_integrity_status: integrity_report.status.as_str().to_string(),
            tool_integrity_details: serde_json::to_value(&integrity_report)?,
            auth_status: auth_report.status.as_str().to_string(),
            auth_details: serde_json::to_value(&auth_report)?,
            exposure_status: exposure_report.status.as_str().to_string(),
            exposure_details: serde_json::to_value(&exposure_report)?,
            trust_score,
            tool_definitions_hash: tools_hash,
            scan_duration_ms: duration_ms,
        };
        let (scan_id, _) = self.db.insert_scan(&scan).await?;

        let rows: Vec<NewToolDefinition> = tools
            .iter()
            .map(|t| NewToolDefinition {
                tool_name: t.name.clone(),
                description: Some(t.description.clone()),
                parameters: t.parameters.clone(),
                content_hash: t.hash.clone(),
            })
            .collect();
        self.db.insert_tool_definitions(server_id, &rows).await?;

        self.db
            .update_server_after_scan(
                server_id,
                trust_score,
                tools.len() as i32,
                exposure_report.transport.as_str(),
            )
            .await?;

        // Mutation detection is best-effort: a failure here must not fail
        // an otherwise completed scan.
        if let Err(err) = self.record_mutations(server_id, &prior_tools, &tools).await {
            tracing::warn!("scan: mutation detection failed for server {server_id}: {err}");
        }

        tracing::debug!(
            "scan: {source_url} scan {scan_id} done in {duration_ms}ms (score {trust_score}, {} tools)",
            tools.len()
        );

        Ok(ScanOutcome {
            trust_score,
            tools_found: tools.len(),
            duration_ms,
        })
    }

    async fn record_mutations(
        &self,
        server_id: Uuid,
        prior: &[crate::models::ToolDefinition],
        current: &[ExtractedTool],
    ) -> Result<(), sqlx::Error> {
        for m in mutation::diff_tool_sets(prior, current) {
            self.db.insert_mutation(server_id, &m).await?;
        }
        Ok(())
    }
}

/// The three checks are independent; run them on blocking threads in
/// parallel.
async fn run_checks(
    repo: &Path,
) -> Result<((IntegrityReport, Vec<ExtractedTool>), AuthReport, ExposureReport), ScanError> {
    let integrity_path = repo.to_path_buf();
    let auth_path = repo.to_path_buf();
    let exposure_path = repo.to_path_buf();

    let integrity = tokio::task::spawn_blocking(move || integrity::check(&integrity_path));
    let auth = tokio::task::spawn_blocking(move || auth::check(&auth_path));
    let exposure = tokio::task::spawn_blocking(move || exposure::check(&exposure_path));

    tokio::try_join!(integrity, auth, exposure).map_err(|e| ScanError::CheckFailed(e.to_string()))
}

/// Composite hash of a tool set: individual hashes sorted by tool name,
/// joined with `|` separators, hashed once more. Empty set hashes to the
/// empty string.
pub fn compute_tools_hash(tools: &[ExtractedTool]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut sorted: Vec<(&str, &str)> = tools
        .iter()
        .map(|t| (t.name.as_str(), t.hash.as_str()))
        .collect();
    sorted.sort_by_key(|(name, _)| *name);

    let mut hasher = Sha256::new();
    for (_, hash) in sorted {
        hasher.update(hash.as_bytes());
        hasher.update(b"|");
    }
    format!("{:x}", hasher.finalize())
}
