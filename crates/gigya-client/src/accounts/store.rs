//! Account record storage
//!
//! Fetched account records can be kept in any key/value store so repeated
//! lookups skip the remote call. Records are stored under
//! [`cache_key`]`(uid)`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::ClientResult;

/// Key an account record is stored under
pub fn cache_key(uid: &str) -> String {
    format!("gigya-user-{uid}")
}

/// Storage for account records
#[async_trait]
pub trait AccountStore: Send + Sync + std::fmt::Debug {
    /// Read a stored record
    async fn get(&self, key: &str) -> ClientResult<Option<Value>>;

    /// Write a record, replacing any previous one
    async fn put(&self, key: &str, record: Value) -> ClientResult<()>;

    /// Drop a record
    async fn remove(&self, key: &str) -> ClientResult<()>;
}

/// In-process account store
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    records: DashMap<String, Value>,
}

impl MemoryAccountStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, key: &str) -> ClientResult<Option<Value>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, key: &str, record: Value) -> ClientResult<()> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> ClientResult<()> {
        self.records.remove(key);
        Ok(())
    }
}
