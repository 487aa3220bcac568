//! Official MCP registry backend. The registry is young: an unreachable
//! endpoint or a non-200 answer is treated as "nothing published yet", not
//! as an error.

use serde::Deserialize;

use super::{canonicalize_github_url, discovery_client, DiscoveredServer};

const REGISTRY_URL: &str = "https://registry.modelcontextprotocol.io/v0/servers";

pub struct RegistryDiscoverer {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    servers: Vec<RegistryServer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegistryServer {
    name: String,
    repository: String,
    description: Option<String>,
    author: Option<String>,
    license: Option<String>,
}

impl RegistryDiscoverer {
    pub fn new() -> Self {
        Self {
            client: discovery_client(),
        }
    }

    pub async fn discover(&self) -> Vec<DiscoveredServer> {
        let response = match self.client.get(REGISTRY_URL).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!("discovery: registry returned {}", r.status());
                return Vec::new();
            }
            Err(err) => {
                tracing::debug!("discovery: registry unreachable: {err}");
                return Vec::new();
            }
        };

        let parsed: RegistryResponse = match response.json().await {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!("discovery: registry payload unreadable: {err}");
                return Vec::new();
            }
        };

        parsed
            .servers
            .into_iter()
            .filter_map(|entry| {
                let source_url = canonicalize_github_url(&entry.repository)?;
                Some(DiscoveredServer {
                    name: entry.name,
                    source_url,
                    package_registry: Some("registry".to_string()),
                    package_name: None,
                    description: entry.description,
                    author: entry.author,
                    license: entry.license,
                    stars: 0,
                })
            })
            .collect()
    }
}

impl Default for RegistryDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}
