use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub tmdb_api_key: String,

    #[serde(default = "default_tmdb_language")]
    pub tmdb_language: String,

    /// Maximum number of entries refreshed at the same time during a sync.
    #[serde(default = "default_sync_concurrency")]
    pub sync_concurrency: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

fn default_database_url() -> String {
    // Use compile-time CARGO_MANIFEST_DIR to find workspace root
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = std::path::Path::new(manifest_dir);

    // Find workspace root (directory with Cargo.toml and crates/)
    if let Some(workspace_root) = path
        .ancestors()
        .find(|p| p.join("Cargo.toml").exists() && p.join("crates").exists())
    {
        let db_path = workspace_root.join("data").join("cinelog.db");
        return format!("sqlite:{}?mode=rwc", db_path.display());
    }

    "sqlite:./data/cinelog.db?mode=rwc".to_string()
}

fn default_tmdb_language() -> String {
    "en-US".to_string()
}

fn default_sync_concurrency() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_sync_interval_secs() -> u64 {
    60 * 60
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<Config>()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(60))
    }
}
