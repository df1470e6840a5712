use serde::{Deserialize, Serialize};

/// Outcome of checking a caller's credential against the quota store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Credential matched the admin key: unlimited, nothing decremented
    Admin,
    /// Known key with quota left; carries the counter after the decrement
    Authorized { remaining: i64 },
    /// No credential in the header nor in the fallback query parameter
    Unauthenticated,
    /// Credential is not present in the store
    Unknown,
    /// Counter is at or below zero
    Exhausted,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Admin | Decision::Authorized { .. })
    }
}

/// A key together with the quota it was registered with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGrant {
    pub key: String,
    pub total: i64,
}

impl KeyGrant {
    pub fn new(key: impl Into<String>, total: i64) -> Self {
        Self {
            key: key.into(),
            total,
        }
    }
}

/// Shorten a credential for log output (first 4 chars only)
pub fn mask_key(key: &str) -> String {
    if key.chars().count() <= 4 {
        return "***".to_string();
    }
    let prefix: String = key.chars().take(4).collect();
    format!("{}***", prefix)
}
