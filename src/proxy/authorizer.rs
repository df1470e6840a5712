// Credential check and quota consumption

use std::sync::Arc;

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

use crate::models::{mask_key, Decision};
use crate::proxy::store::{QuotaStore, StoreResult};

/// Pull the caller's credential out of a request.
///
/// The header wins; the query parameter is only consulted when one is
/// configured and the header is absent. Header bytes are read as latin-1,
/// so an opaque header still counts as a (probably unknown) credential.
pub fn extract_credential(
    headers: &HeaderMap,
    query: Option<&str>,
    check_header: &str,
    check_query: Option<&str>,
) -> Option<String> {
    if let Some(value) = headers.get(check_header) {
        return Some(value.as_bytes().iter().map(|&b| char::from(b)).collect());
    }

    let (name, query) = (check_query?, query?);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn QuotaStore>,
    admin_digest: [u8; 32],
}

impl Authorizer {
    pub fn new(store: Arc<dyn QuotaStore>, admin_api_key: &str) -> Self {
        Self {
            store,
            admin_digest: digest(admin_api_key),
        }
    }

    /// Digests are compared instead of the raw strings so the comparison
    /// time does not depend on how much of the admin key was guessed.
    pub fn is_admin(&self, credential: &str) -> bool {
        digest(credential) == self.admin_digest
    }

    /// Classify `credential` and, for a key with quota left, consume one unit.
    ///
    /// The admin check runs before any store access. For regular keys the
    /// value returned by the atomic decrement is authoritative: if a
    /// concurrent caller took the last unit between our read and our
    /// decrement, the result drops below zero and the call is refused.
    pub async fn authorize(&self, credential: Option<&str>) -> StoreResult<Decision> {
        let Some(key) = credential else {
            return Ok(Decision::Unauthenticated);
        };

        if self.is_admin(key) {
            return Ok(Decision::Admin);
        }

        match self.store.get(key).await? {
            None => Ok(Decision::Unknown),
            Some(remaining) if remaining <= 0 => Ok(Decision::Exhausted),
            Some(_) => {
                let remaining = self.store.decrement(key).await?;
                if remaining < 0 {
                    tracing::debug!(key = %mask_key(key), "Quota consumed concurrently");
                    Ok(Decision::Exhausted)
                } else {
                    Ok(Decision::Authorized { remaining })
                }
            }
        }
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
