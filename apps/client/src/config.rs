use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::outbox::PacingPolicy;
use crate::upload::PollPolicy;

/// Client configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub storage_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub send_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_url: require_env("OUTREACH_API_URL")?
                .trim_end_matches('/')
                .to_string(),
            storage_dir: std::env::var("OUTREACH_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".outreach")),
            poll_interval_secs: env_positive("OUTREACH_POLL_INTERVAL_SECS", 5)?,
            poll_timeout_secs: env_positive("OUTREACH_POLL_TIMEOUT_SECS", 120)?,
            send_delay_ms: env_or("OUTREACH_SEND_DELAY_MS", 1000)?,
            http_timeout_secs: env_or("OUTREACH_HTTP_TIMEOUT_SECS", 120)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }

    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            delay: Duration::from_millis(self.send_delay_ms),
            ..PacingPolicy::default()
        }
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.storage_dir.join("local_storage.json")
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}

/// Like `env_or`, but zero is rejected.
fn env_positive(key: &str, default: u64) -> Result<u64> {
    let value = env_or(key, default)?;
    if value == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }
    Ok(value)
}
