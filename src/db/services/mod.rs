//! Repositories over the key-value store.
//!
//! Each repository owns one record kind and translates between typed records
//! and raw store documents. None of them touches more than one key per call;
//! keeping the two kinds consistent with each other is the job of
//! `services::bookmark_service`.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use super::error::RepositoryError;
use super::kv_client::{KvStore, PutOutcome};
use super::models::{Listing, SkippedKey};

pub mod tag_service;
pub mod url_service;

pub use tag_service::TagRepository;
pub use url_service::UrlRepository;

/// Fetches and decodes the document at `key`.
pub(crate) async fn fetch_record<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<T, RepositoryError> {
    let bytes = store
        .get(key)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(key.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|source| RepositoryError::Decode {
        key: key.to_string(),
        source,
    })
}

pub(crate) async fn store_record<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    record: &T,
) -> Result<PutOutcome, RepositoryError> {
    let body = serde_json::to_vec(record)?;
    Ok(store.put(key, Bytes::from(body)).await?)
}

/// A repository whose records can be enumerated by prefix scan.
#[async_trait]
pub trait ScannableRepository: Send + Sync {
    type Record: Send;

    fn store(&self) -> &dyn KvStore;

    fn scan_prefix(&self) -> String;

    /// Loads the record stored under a full key as returned by a scan.
    async fn load_key(&self, key: &str) -> Result<Self::Record, RepositoryError>;

    /// Every record under the repository's prefix. Keys that do not resolve
    /// are reported in `skipped` instead of failing the listing; only a
    /// failure of the scan itself is an error.
    async fn list_all(&self) -> Result<Listing<Self::Record>, RepositoryError> {
        let prefix = self.scan_prefix();
        let mut keys = self.store().scan_prefix(&prefix).await?;
        let mut listing = Listing::default();

        while let Some(key) = keys.try_next().await? {
            match self.load_key(&key).await {
                Ok(record) => listing.items.push(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping record that failed to resolve.");
                    listing.skipped.push(SkippedKey {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(listing)
    }
}
