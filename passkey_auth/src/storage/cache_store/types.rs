use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

/// Process-local cache store. Entries past their `expires_at` read as absent.
pub struct InMemoryCacheStore {
    pub(super) entry: HashMap<String, CacheData>,
}

/// Cache store backed by a Redis server, with expiry delegated to `EXPIRE`.
pub struct RedisCacheStore {
    pub(super) client: redis::Client,
}

/// Cache store handle shared between request handlers.
pub type SharedCacheStore = Arc<Mutex<Box<dyn CacheStore>>>;

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put a value into the store with a TTL in seconds.
    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError>;

    /// Get a value from the store.
    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Remove a value from the store.
    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError>;
}
