// Storage layer: the remote key-value client, key derivation, record types
// and the per-record repositories built on top of them.
pub mod error;
pub mod keys;
pub mod kv_client;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory_store;
pub mod models;
pub mod services;

pub use error::RepositoryError;
pub use keys::{derive_url_id, KeySpace};
pub use kv_client::{HttpKvStore, KvError, KvStore};
#[cfg(any(test, feature = "test-utils"))]
pub use memory_store::MemoryKvStore;
pub use models::{Listing, SkippedKey, TagRecord, UrlRecord};
