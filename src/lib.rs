pub mod commands;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod expiration;
pub mod ids;
pub mod models;
pub mod storage;
pub mod store;
pub mod sweeper;
pub mod types;

use config::{Config, StorageKind};
use db::Database;
pub use error::{ApiError, ApiResult};
use storage::memory::MemoryStorage;
use storage::AnyStorage;
use store::PasteStore;

/// Shared state of a running instance.
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub store: PasteStore<AnyStorage>,
}

impl App {
    /// Open the storage named by the config.
    pub async fn load(config: Config) -> anyhow::Result<Self> {
        let storage: AnyStorage = match config.storage.kind {
            StorageKind::Memory => MemoryStorage::new().into(),
            StorageKind::Database => {
                Database::connect(&config.database.url, config.database.max_connections)
                    .await?
                    .into()
            }
        };
        Ok(Self::with_storage(config, storage))
    }

    pub fn with_storage(config: Config, storage: AnyStorage) -> Self {
        App {
            config,
            store: PasteStore::new(storage),
        }
    }
}
