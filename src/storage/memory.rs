use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Storage, StorageResult};
use crate::models::{self, Paste};

/// Process-local storage; contents are lost on exit.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<RwLock<HashMap<String, Paste>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    async fn insert(&self, paste: &Paste) -> StorageResult<bool> {
        let mut records = self.records.write();
        if records.contains_key(&paste.id) {
            return Ok(false);
        }
        records.insert(paste.id.clone(), paste.clone());
        Ok(true)
    }

    async fn fetch(&self, id: &str) -> StorageResult<Option<Paste>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn delete_expired(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let mut records = self.records.write();
        let expired = records
            .get(id)
            .map_or(false, |paste| paste.expires_at.is_some() && !paste.is_live(&now));
        if expired {
            records.remove(id);
        }
        Ok(expired)
    }

    async fn scan_expirable(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<Vec<(String, DateTime<Utc>)>> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter_map(|paste| paste.expires_at.map(|deadline| (paste, deadline)))
            .filter(|(_, deadline)| !models::is_live(Some(deadline), &cutoff))
            .map(|(paste, deadline)| (paste.id.clone(), deadline))
            .collect())
    }
}
