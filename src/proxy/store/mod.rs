// Quota store - remaining-usage counters keyed by API key

pub mod memory;
pub mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::proxy::config::StoreConfig;

pub use self::memory::MemoryQuotaStore;
pub use self::redis_store::RedisQuotaStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Counter storage shared by the authorizer and the key registry.
///
/// The store is the single source of truth: callers never cache counters
/// across requests. `decrement` must be atomic with respect to concurrent
/// callers on the same key.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Current counter for `key`, `None` when the key is unknown.
    async fn get(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Set the counter for `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: i64) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically decrement the counter by one and return the new value.
    /// An absent key is treated as 0.
    async fn decrement(&self, key: &str) -> StoreResult<i64>;
}

/// Open the backend selected by configuration
pub async fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn QuotaStore>> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory quota store, counters are lost on restart");
            Ok(Arc::new(MemoryQuotaStore::new()))
        }
        StoreConfig::Redis { host, port } => {
            let url = format!("redis://{}:{}/", host, port);
            let store = RedisQuotaStore::connect(&url).await?;
            tracing::info!("Connected to Redis quota store at {}", url);
            Ok(Arc::new(store))
        }
    }
}
