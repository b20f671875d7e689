use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_LANGUAGE: &str = "pt-BR";
pub const DEFAULT_REGION: &str = "BR";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BIND: &str = "0.0.0.0:3147";

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    pub region: String,
    pub request_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3147)),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("TMDB_API_KEY not set"))?;
        let mut config = Self::new(api_key);

        if let Some(base) = non_empty_var("TMDB_BASE_URL") {
            config.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(lang) = non_empty_var("MEDIAVAULT_LANGUAGE") {
            config.language = lang;
        }
        if let Some(region) = non_empty_var("MEDIAVAULT_REGION") {
            config.region = region.to_uppercase();
        }
        if let Some(secs) = non_empty_var("MEDIAVAULT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("MEDIAVAULT_TIMEOUT_SECS is not a number: {secs}"))?;
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        let bind = non_empty_var("MEDIAVAULT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("MEDIAVAULT_BIND is not a socket address: {bind}"))?;

        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
