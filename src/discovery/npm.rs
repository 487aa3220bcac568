//! npm registry backend.

use serde::Deserialize;

use super::{canonicalize_github_url, deduplicate, discovery_client, DiscoveredServer};

const SEARCH_URL: &str = "https://registry.npmjs.org/-/v1/search";
const PAGE_SIZE: u32 = 250;

const QUERIES: &[&str] = &[
    "mcp server",
    "model context protocol",
    "mcp-server",
    "@modelcontextprotocol",
];

pub struct NpmDiscoverer {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    package: Package,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Package {
    name: String,
    description: Option<String>,
    links: Links,
    author: Option<Author>,
    publisher: Option<Publisher>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Links {
    repository: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Publisher {
    username: Option<String>,
}

impl NpmDiscoverer {
    pub fn new() -> Self {
        Self {
            client: discovery_client(),
        }
    }

    /// Search npm for MCP-related packages. A failed query is logged and
    /// skipped; the remaining queries still contribute.
    pub async fn discover(&self) -> Vec<DiscoveredServer> {
        let mut servers = Vec::new();

        for query in QUERIES {
            match self.search(query).await {
                Ok(found) => servers.extend(found),
                Err(err) => tracing::warn!("discovery: npm search '{query}' failed: {err}"),
            }
        }

        deduplicate(servers)
    }

    async fn search(&self, query: &str) -> Result<Vec<DiscoveredServer>, reqwest::Error> {
        let size = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("text", query), ("size", size.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        let servers = response
            .objects
            .into_iter()
            .filter_map(|obj| {
                let pkg = obj.package;
                let repo = pkg.links.repository.as_deref()?;
                let source_url = canonicalize_github_url(repo)?;

                let author = pkg
                    .author
                    .and_then(|a| a.name)
                    .or_else(|| pkg.publisher.and_then(|p| p.username));

                Some(DiscoveredServer {
                    source_url,
                    package_registry: Some("npm".to_string()),
                    package_name: Some(pkg.name.clone()),
                    description: pkg.description,
                    author,
                    license: None,
                    stars: 0,
                    name: pkg.name,
                })
            })
            .collect();

        Ok(servers)
    }
}

impl Default for NpmDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}
