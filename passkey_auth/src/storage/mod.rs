mod cache_store;
mod errors;
mod types;

pub use cache_store::{
    CacheStore, InMemoryCacheStore, RedisCacheStore, SharedCacheStore, cache_store_from_env,
    shared_cache_store,
};
pub use errors::StorageError;
pub use types::CacheData;
