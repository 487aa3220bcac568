//! GitHub repository search backend.

use serde::Deserialize;

use super::{deduplicate, discovery_client, DiscoveredServer};

const SEARCH_URL: &str = "https://api.github.com/search/repositories";
const PAGE_SIZE: u32 = 100;

const QUERIES: &[&str] = &[
    "topic:mcp-server",
    "topic:model-context-protocol",
    "mcp server in:name,description",
];

pub struct GitHubDiscoverer {
    client: reqwest::Client,
    /// Optional bearer token; unauthenticated search works but rate-limits
    /// hard.
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Repo {
    full_name: String,
    html_url: String,
    description: Option<String>,
    owner: Option<Owner>,
    stargazers_count: i32,
    license: Option<License>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Owner {
    login: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct License {
    name: Option<String>,
}

impl GitHubDiscoverer {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: discovery_client(),
            token,
        }
    }

    pub async fn discover(&self) -> Vec<DiscoveredServer> {
        let mut servers = Vec::new();

        for query in QUERIES {
            match self.search(query).await {
                Ok(found) => servers.extend(found),
                Err(err) => tracing::warn!("discovery: github search '{query}' failed: {err}"),
            }
        }

        deduplicate(servers)
    }

    async fn search(&self, query: &str) -> Result<Vec<DiscoveredServer>, reqwest::Error> {
        let per_page = PAGE_SIZE.to_string();
        let mut request = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("q", query),
                ("sort", "updated"),
                ("per_page", per_page.as_str()),
            ])
            .header("Accept", "application/vnd.github.v3+json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        let servers = response
            .items
            .into_iter()
            .map(|repo| DiscoveredServer {
                name: repo.full_name,
                source_url: repo.html_url,
                package_registry: None,
                package_name: None,
                description: repo.description,
                author: repo.owner.and_then(|o| o.login),
                license: repo.license.and_then(|l| l.name),
                stars: repo.stargazers_count,
            })
            .collect();

        Ok(servers)
    }
}
