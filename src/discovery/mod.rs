//! Discovery fan-in: query the npm registry, GitHub and the MCP registry
//! for MCP server implementations and normalise everything into one record
//! shape keyed by canonical GitHub URL.

mod github;
mod npm;
mod registry;

pub use github::GitHubDiscoverer;
pub use npm::NpmDiscoverer;
pub use registry::RegistryDiscoverer;

use std::collections::HashSet;

/// Timeout applied to every discovery HTTP client.
pub(crate) const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// A server found by any backend, normalised and ready to upsert.
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub name: String,
    /// Canonical GitHub URL; the global dedup key.
    pub source_url: String,
    pub package_registry: Option<String>,
    pub package_name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub stars: i32,
}

pub(crate) fn discovery_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("mcpsek/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Rewrite the various repository URL spellings found in package metadata
/// into one canonical `https://github.com/...` form. Anything that does not
/// resolve to GitHub is dropped.
pub fn canonicalize_github_url(raw: &str) -> Option<String> {
    let mut url = raw.trim().to_string();

    if let Some(rest) = url.strip_prefix("git://") {
        url = format!("https://{rest}");
    }
    if let Some(rest) = url.strip_prefix("git+") {
        url = rest.to_string();
    }
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        url = format!("https://github.com/{rest}");
    }
    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }

    if !url.contains("github.com") {
        return None;
    }

    Some(url)
}

/// Drop repeat sightings of the same canonical URL, first occurrence wins.
pub fn deduplicate(servers: Vec<DiscoveredServer>) -> Vec<DiscoveredServer> {
    let mut seen = HashSet::new();
    servers
        .into_iter()
        .filter(|s| seen.insert(s.source_url.clone()))
        .collect()
}
