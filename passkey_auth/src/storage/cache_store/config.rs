use std::{env, sync::Arc, sync::LazyLock};
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore, SharedCacheStore};

static GENERIC_CACHE_STORE_TYPE: LazyLock<String> = LazyLock::new(|| {
    env::var("GENERIC_CACHE_STORE_TYPE").unwrap_or_else(|_| "memory".to_string())
});

static GENERIC_CACHE_STORE_URL: LazyLock<String> = LazyLock::new(|| {
    env::var("GENERIC_CACHE_STORE_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
});

/// Wraps a cache store so it can be shared between sessions and tasks.
pub fn shared_cache_store<S: CacheStore>(store: S) -> SharedCacheStore {
    Arc::new(Mutex::new(Box::new(store)))
}

/// Builds the cache store selected by `GENERIC_CACHE_STORE_TYPE` and verifies it is reachable.
pub async fn cache_store_from_env() -> Result<SharedCacheStore, StorageError> {
    let store_type = GENERIC_CACHE_STORE_TYPE.as_str();
    let store_url = GENERIC_CACHE_STORE_URL.as_str();

    tracing::info!("Initializing cache store with type: {}", store_type);

    let store: Box<dyn CacheStore> = match store_type {
        "memory" => Box::new(InMemoryCacheStore::new()),
        "redis" => {
            let client = redis::Client::open(store_url).map_err(|e| {
                tracing::error!("Failed to create Redis client: {}", e);
                StorageError::from(e)
            })?;
            Box::new(RedisCacheStore { client })
        }
        t => {
            return Err(StorageError::Storage(format!(
                "Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"
            )));
        }
    };

    store.init().await?;

    tracing::info!("Connected to cache store: type={}", store_type);

    Ok(Arc::new(Mutex::new(store)))
}
