// ⚙️ Runtime configuration
// Defaults work out of the box; environment variables override them.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "CHART_DB_PATH";
pub const ENV_BIND_ADDR: &str = "CHART_BIND_ADDR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CHART_BUSY_TIMEOUT_MS";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the API server listens on
    pub bind_addr: String,

    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// tracing-subscriber filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("chart.db"),
            bind_addr: "127.0.0.1:3000".into(),
            busy_timeout_ms: 5_000,
            log_filter: "chart_defaults=info".into(),
        }
    }
}

impl Config {
    /// Build the config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(addr) = lookup(ENV_BIND_ADDR).filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr;
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.busy_timeout_ms = ms,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "ignoring invalid {}, using {}ms",
                    ENV_BUSY_TIMEOUT_MS,
                    config.busy_timeout_ms
                ),
            }
        }

        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }

        config
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.busy_timeout_ms)
    }
}
