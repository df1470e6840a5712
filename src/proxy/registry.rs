// Key registry - admin operations over the quota store

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::models::KeyGrant;
use crate::proxy::store::{QuotaStore, StoreError, StoreResult};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("API key not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Random 128-bit key rendered as 32 hex characters without separators
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Holds no state of its own and trusts its caller; the admin check
/// happens in the router.
#[derive(Clone)]
pub struct KeyRegistry {
    store: Arc<dyn QuotaStore>,
}

impl KeyRegistry {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, total: i64) -> StoreResult<KeyGrant> {
        let key = generate_key();
        self.store.set(&key, total).await?;
        Ok(KeyGrant::new(key, total))
    }

    /// Last writer wins: an existing counter is overwritten, not added to.
    pub async fn register_specific(&self, key: &str, total: i64) -> StoreResult<KeyGrant> {
        self.store.set(key, total).await?;
        Ok(KeyGrant::new(key, total))
    }

    pub async fn list(&self, key: &str) -> Result<i64, RegistryError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        self.store.delete(key).await
    }
}
