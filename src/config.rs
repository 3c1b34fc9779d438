use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use directories_next::ProjectDirs;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub port: u16,
    pub storage: Storage,
    pub database: Database,
    pub limits: Limits,
    pub sweep: Sweep,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub kind: StorageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Database,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_upload_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sweep {
    pub interval_secs: u64,
}

impl Config {
    /// Load the config file at `path`, falling back to defaults if it does
    /// not exist.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Config::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(text)?;
        anyhow::ensure!(config.sweep.interval_secs > 0, "sweep.interval_secs must be positive");
        anyhow::ensure!(
            config.database.max_connections > 0,
            "database.max_connections must be positive"
        );
        Ok(config)
    }
}

impl Sweep {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: "http://localhost:8080".into(),
            port: 8080,
            storage: Storage::default(),
            database: Database::default(),
            limits: Limits::default(),
            sweep: Sweep::default(),
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Storage {
            kind: StorageKind::Database,
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Database {
            url: default_database_url(),
            max_connections: 5,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_upload_size: 1024 * 1024,
        }
    }
}

impl Default for Sweep {
    fn default() -> Self {
        Sweep { interval_secs: 60 }
    }
}

/// SQLite database in the platform data directory, or the working directory
/// when there is none.
fn default_database_url() -> String {
    let path = ProjectDirs::from("", "", "bitpaste")
        .map(|dirs| dirs.data_dir().join("bitpaste.db"))
        .unwrap_or_else(|| "bitpaste.db".into());
    format!("sqlite://{}?mode=rwc", path.display())
}
