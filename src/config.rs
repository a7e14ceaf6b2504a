//! Server configuration from flags, environment and `.env`.

use crate::{analytics::EngineConfig, api::ApiLimits};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "popularity-api")]
#[command(about = "Popularity analytics API - rankings, movers and histograms")]
pub struct Config {
    /// SQLite database holding popularity samples and the instrument directory.
    /// Relative paths resolve against the crate directory.
    #[arg(long, env = "POPULARITY_DB_PATH", default_value = "popularity.db")]
    pub db_path: String,

    /// Address the HTTP server binds to
    #[arg(long, env = "POPULARITY_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Lookback, in seconds, that counts as "current" popularity
    #[arg(long, env = "POPULARITY_CURRENT_WINDOW_SECS", default_value = "7200")]
    pub current_window_secs: u64,

    /// Timeout for every store or directory call, in milliseconds
    #[arg(long, env = "POPULARITY_QUERY_TIMEOUT_MS", default_value = "5000")]
    pub query_timeout_ms: u64,

    /// Response cache TTL in seconds (0 disables caching)
    #[arg(long, env = "POPULARITY_CACHE_TTL_SECS", default_value = "60")]
    pub cache_ttl_secs: u64,

    /// Largest page size a caller may request
    #[arg(long, env = "POPULARITY_MAX_PAGE", default_value = "500")]
    pub max_page: usize,

    /// Largest histogram bucket count a caller may request
    #[arg(long, env = "POPULARITY_MAX_BUCKETS", default_value = "1000")]
    pub max_buckets: usize,
}

impl Config {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            current_window: Duration::from_secs(self.current_window_secs),
            query_timeout: Duration::from_millis(self.query_timeout_ms),
        }
    }

    pub fn limits(&self) -> ApiLimits {
        ApiLimits {
            max_page: self.max_page,
            max_buckets: self.max_buckets,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Database path with relative paths anchored at the crate directory, so
    /// running from elsewhere doesn't silently create an empty database.
    pub fn resolved_db_path(&self) -> String {
        resolve_data_path(&self.db_path, Path::new(env!("CARGO_MANIFEST_DIR")))
    }
}

pub fn resolve_data_path(raw: &str, base: &Path) -> String {
    let raw = raw.trim();
    if raw == ":memory:" {
        return raw.to_string();
    }
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }
    base.join(p).to_string_lossy().to_string()
}

/// Load `.env` from the working directory (and parents), then the crate directory.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
