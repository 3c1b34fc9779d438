use std::future::Future;

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::error::StorageError;
use crate::models::Paste;

pub mod memory;

use memory::MemoryStorage;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence backend for paste records.
///
/// Only the paste store calls these methods. Implementations must make
/// `insert` atomic per id.
pub trait Storage: Send + Sync {
    /// Insert a paste unless a record with the same id exists.
    ///
    /// Returns `false` when the id is already taken.
    fn insert(&self, paste: &Paste) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Get a paste by id, live or not.
    fn fetch(&self, id: &str) -> impl Future<Output = StorageResult<Option<Paste>>> + Send;

    /// Delete a paste if its deadline is at or before `now`.
    ///
    /// Returns `false` when the record is missing or still live; deleting an
    /// already deleted record is not an error.
    fn delete_expired(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StorageResult<bool>> + Send;

    /// List ids and deadlines of records expiring at or before `cutoff`.
    fn scan_expirable(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = StorageResult<Vec<(String, DateTime<Utc>)>>> + Send;
}

#[derive(Clone)]
pub enum AnyStorage {
    Memory(MemoryStorage),
    Database(Database),
}

impl Storage for AnyStorage {
    async fn insert(&self, paste: &Paste) -> StorageResult<bool> {
        match self {
            AnyStorage::Memory(memory) => memory.insert(paste).await,
            AnyStorage::Database(database) => database.insert(paste).await,
        }
    }

    async fn fetch(&self, id: &str) -> StorageResult<Option<Paste>> {
        match self {
            AnyStorage::Memory(memory) => memory.fetch(id).await,
            AnyStorage::Database(database) => database.fetch(id).await,
        }
    }

    async fn delete_expired(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        match self {
            AnyStorage::Memory(memory) => memory.delete_expired(id, now).await,
            AnyStorage::Database(database) => database.delete_expired(id, now).await,
        }
    }

    async fn scan_expirable(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<Vec<(String, DateTime<Utc>)>> {
        match self {
            AnyStorage::Memory(memory) => memory.scan_expirable(cutoff).await,
            AnyStorage::Database(database) => database.scan_expirable(cutoff).await,
        }
    }
}

impl From<MemoryStorage> for AnyStorage {
    fn from(value: MemoryStorage) -> Self {
        AnyStorage::Memory(value)
    }
}

impl From<Database> for AnyStorage {
    fn from(value: Database) -> Self {
        AnyStorage::Database(value)
    }
}
