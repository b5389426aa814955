//! In-memory session collection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::changeset::Changeset;
use crate::collection::{SessionCollection, SessionRecord};
use crate::config::{DEFAULT_COLLECTION, SessionConfig};
use crate::error::Result;
use crate::ttl::is_expired;

/// In-memory session collection.
///
/// Stores records in a HashMap. Expired records are hidden and dropped on
/// read, standing in for a store-side expiry index. Suitable for development
/// and testing; records are lost on restart and not shared across processes.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemoryCollection {
    /// Create an empty collection with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create an empty collection named by `config`.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.collection.clone())
    }

    /// Number of stored records, expired or not.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if the collection holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Insert or overwrite a record directly, bypassing changesets.
    pub async fn insert(&self, record: SessionRecord) {
        let mut records = self.records.write().await;
        records.insert(record.key.clone(), record);
    }

    /// Remove all expired records, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let initial_len = records.len();
        records.retain(|_, record| !is_expired(record.expire_at, now));
        let removed = initial_len - records.len();
        if removed > 0 {
            debug!(collection = %self.name, removed, "Purged expired sessions");
        }
        removed
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION)
    }
}

#[async_trait]
impl SessionCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, key: &str) -> Result<Option<SessionRecord>> {
        let records = self.records.read().await;

        let expired = match records.get(key) {
            Some(record) if !is_expired(record.expire_at, Utc::now()) => {
                return Ok(Some(record.clone()));
            }
            Some(_) => true,
            None => false,
        };
        drop(records);

        if expired {
            // Re-check under the write lock; a concurrent upsert may have refreshed it.
            let mut records = self.records.write().await;
            if records
                .get(key)
                .is_some_and(|record| is_expired(record.expire_at, Utc::now()))
            {
                records.remove(key);
            }
        }
        Ok(None)
    }

    async fn delete_one(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(key);
        Ok(())
    }

    async fn update_one(&self, key: &str, changeset: &Changeset, upsert: bool) -> Result<()> {
        let mut records = self.records.write().await;

        // An expired record counts as missing.
        if records
            .get(key)
            .is_some_and(|record| is_expired(record.expire_at, Utc::now()))
        {
            records.remove(key);
        }

        match records.get_mut(key) {
            Some(record) => record.apply(changeset),
            None if upsert => {
                let mut record = SessionRecord::new(key, changeset.expire_at);
                record.apply(changeset);
                records.insert(key.to_string(), record);
            }
            None => {}
        }
        Ok(())
    }

    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }
}
