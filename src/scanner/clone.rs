//! Git clone cache. One directory per `<owner>/<repo>`, refreshed with a
//! fast-forward pull when it already exists, shallow-cloned otherwise.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::ScanError;

const CLONE_TIMEOUT_SECS: u64 = 60;
const REFRESH_TIMEOUT_SECS: u64 = 30;
const MAX_REPO_BYTES: u64 = 500 * 1024 * 1024;

pub struct CloneManager {
    base_dir: PathBuf,
    /// Per-canonical-URL locks so concurrent scans of the same repository
    /// never touch the same working tree at once.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CloneManager {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Produce a local snapshot of the repository's default branch and
    /// return its path.
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        repo_url: &str,
    ) -> Result<PathBuf, ScanError> {
        let (owner, repo) = parse_repo_url(repo_url)?;
        let target = self.base_dir.join(&owner).join(&repo);

        let lock = self.url_lock(repo_url).await;
        let _guard = lock.lock().await;

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        if target.join(".git").exists() {
            match self.refresh(cancel, &target).await {
                Ok(()) => return Ok(target),
                Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
                Err(err) => {
                    // Stale or diverged checkout; rebuild from scratch.
                    tracing::debug!("clone: refresh of {} failed ({err}), re-cloning", repo_url);
                    tokio::fs::remove_dir_all(&target).await.ok();
                }
            }
        }

        self.clone_fresh(cancel, repo_url, &target).await?;
        Ok(target)
    }

    async fn url_lock(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(url.to_string()).or_default().clone()
    }

    async fn clone_fresh(
        &self,
        cancel: &CancellationToken,
        repo_url: &str,
        target: &Path,
    ) -> Result<(), ScanError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        run_git(
            cancel,
            "clone",
            CLONE_TIMEOUT_SECS,
            &[
                "clone",
                "--depth",
                "1",
                "--single-branch",
                repo_url,
                &target.to_string_lossy(),
            ],
            None,
        )
        .await?;

        let size = dir_size(target.to_path_buf()).await?;
        if size > MAX_REPO_BYTES {
            tokio::fs::remove_dir_all(target).await.ok();
            return Err(ScanError::OversizedRepository {
                size_mb: size / (1024 * 1024),
            });
        }

        Ok(())
    }

    async fn refresh(&self, cancel: &CancellationToken, target: &Path) -> Result<(), ScanError> {
        run_git(
            cancel,
            "pull",
            REFRESH_TIMEOUT_SECS,
            &["pull", "--ff-only"],
            Some(target),
        )
        .await
    }
}

async fn run_git(
    cancel: &CancellationToken,
    op: &'static str,
    timeout_secs: u64,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<(), ScanError> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let run = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output());

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(ScanError::Cancelled),
        result = run => match result {
            Err(_) => {
                return Err(ScanError::GitTimeout {
                    op,
                    seconds: timeout_secs,
                })
            }
            Ok(output) => output.map_err(|e| ScanError::Git {
                op,
                detail: e.to_string(),
            })?,
        },
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("unknown error").to_string();
        return Err(ScanError::Git { op, detail });
    }

    Ok(())
}

/// Derive `(owner, repo)` from a canonical GitHub URL.
fn parse_repo_url(url: &str) -> Result<(String, String), ScanError> {
    let url = url.trim().trim_end_matches(".git");

    let rest = if let Some(rest) = url.strip_prefix("https://github.com/") {
        rest
    } else if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else {
        return Err(ScanError::UnsupportedUrl(url.to_string()));
    };

    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) => Ok((owner.to_string(), repo.to_string())),
        _ => Err(ScanError::UnsupportedUrl(url.to_string())),
    }
}

/// Total on-disk size of a directory tree, computed off the async runtime.
async fn dir_size(path: PathBuf) -> Result<u64, ScanError> {
    tokio::task::spawn_blocking(move || {
        walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    })
    .await
    .map_err(|e| ScanError::Git {
        op: "size",
        detail: e.to_string(),
    })
}
