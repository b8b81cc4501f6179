use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SUGGEST_MODEL: &str = "gpt-4o-mini";

/// Server settings, read from the process environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// SQLite url. Rooms live in memory when unset.
    pub database_url: Option<String>,
    pub room_idle_ttl: Duration,
    pub sweep_interval: Duration,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub suggest_model: String,
}

fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs(key: &str, raw: Option<String>, default: u64) -> anyhow::Result<Duration> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_secs)
            .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}")),
        None => Ok(Duration::from_secs(default)),
    }
}

/// Like [`secs`], for values used as a timer period.
fn period(key: &str, raw: Option<String>, default: u64) -> anyhow::Result<Duration> {
    let period = secs(key, raw, default)?;
    anyhow::ensure!(!period.is_zero(), "{key} must be at least one second");
    Ok(period)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = match var("BIND_ADDR") {
            Some(addr) => addr.parse().with_context(|| format!("invalid BIND_ADDR {addr:?}"))?,
            None => {
                let port = match var("PORT") {
                    Some(port) => port.parse().with_context(|| format!("invalid PORT {port:?}"))?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            room_idle_ttl: secs("ROOM_IDLE_TTL_SECS", var("ROOM_IDLE_TTL_SECS"), 24 * 60 * 60)?,
            sweep_interval: period("SWEEP_INTERVAL_SECS", var("SWEEP_INTERVAL_SECS"), 10 * 60)?,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_owned()),
            suggest_model: var("SUGGEST_MODEL")
                .unwrap_or_else(|| DEFAULT_SUGGEST_MODEL.to_owned()),
        })
    }
}
