//! In-memory [`QuotaStore`] backed by a `DashMap`.
//!
//! Suitable for tests and single-instance deployments; counters do not
//! survive a restart.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{QuotaStore, StoreResult};

#[derive(Clone, Default)]
pub struct MemoryQuotaStore {
    counters: Arc<DashMap<String, i64>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a counter without `await`, for tests and bootstrapping
    pub fn insert(&self, key: impl Into<String>, value: i64) {
        self.counters.insert(key.into(), value);
    }

    /// Read a counter without `await`
    pub fn peek(&self, key: &str) -> Option<i64> {
        self.counters.get(key).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: i64) -> StoreResult<()> {
        self.counters.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.counters.remove(key);
        Ok(())
    }

    async fn decrement(&self, key: &str) -> StoreResult<i64> {
        // The entry guard holds the shard lock for the whole read-modify-write
        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter -= 1;
        Ok(*counter)
    }
}
