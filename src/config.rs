// Environment-driven configuration, read once at startup.
//
// Every knob has a default so a bare `cargo run` against a local Postgres
// works; invalid values are fatal rather than silently replaced.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_addr: String,
    pub clone_dir: PathBuf,
    pub scan_workers: usize,
    pub scan_interval: Duration,
    pub discovery_interval: Duration,
    pub github_token: Option<String>,
    /// API requests per minute, enforced per client IP.
    pub api_rate_limit: u64,
    /// Reserved for external exposure probing; unused by the core.
    #[allow(dead_code)]
    pub shodan_api_key: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Config> {
        let cfg = Config {
            database_url: env_or(
                "DB_URL",
                "postgres://localhost:5432/mcpsek?sslmode=disable",
            ),
            http_addr: env_or("HTTP_ADDR", ":8080"),
            clone_dir: PathBuf::from(env_or("CLONE_DIR", "/tmp/mcpsek-repos")),
            scan_workers: env_parsed("SCAN_WORKERS", 4)?,
            scan_interval: env_duration("SCAN_INTERVAL", Duration::from_secs(24 * 60 * 60))?,
            discovery_interval: env_duration(
                "DISCOVERY_INTERVAL",
                Duration::from_secs(168 * 60 * 60),
            )?,
            github_token: env_opt("GITHUB_TOKEN"),
            api_rate_limit: env_parsed("API_RATE_LIMIT", 100)?,
            shodan_api_key: env_opt("SHODAN_API_KEY"),
        };

        if cfg.database_url.is_empty() {
            bail!("DB_URL must not be empty");
        }
        if cfg.scan_workers == 0 {
            bail!("SCAN_WORKERS must be at least 1");
        }
        if cfg.api_rate_limit == 0 {
            bail!("API_RATE_LIMIT must be at least 1");
        }

        Ok(cfg)
    }

    /// Resolve `HTTP_ADDR` into a bindable socket address. A bare `:port`
    /// form binds all interfaces.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_listen_addr(&self.http_addr)
            .with_context(|| format!("invalid HTTP_ADDR '{}'", self.http_addr))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .with_context(|| format!("invalid {key} '{raw}'")),
        _ => Ok(default),
    }
}

fn env_duration(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => humantime::parse_duration(&raw)
            .with_context(|| format!("invalid {key} '{raw}' (expected e.g. '24h', '30m')")),
        _ => Ok(default),
    }
}

fn parse_listen_addr(addr: &str) -> anyhow::Result<SocketAddr> {
    let normalized = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    Ok(normalized.parse::<SocketAddr>()?)
}
