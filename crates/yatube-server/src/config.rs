use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub secret: String,
    pub index_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret = var("YATUBE_SECRET").unwrap_or_default();
        if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
            bail!("YATUBE_SECRET is unset or still a placeholder");
        }

        let host = var("YATUBE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("YATUBE_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("YATUBE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("YATUBE_HOST must be an IP address")?;

        let db_path: PathBuf = var("YATUBE_DB_PATH").unwrap_or_else(|| "yatube.db".into()).into();
        let media_dir: PathBuf = var("YATUBE_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into();
        let cache_secs: u64 = var("YATUBE_INDEX_CACHE_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        Ok(Self {
            addr,
            db_path,
            media_dir,
            secret,
            index_cache_ttl: Duration::from_secs(cache_secs),
        })
    }
}
