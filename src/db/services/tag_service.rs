use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::error::RepositoryError;
use crate::db::keys::{KeySpace, RecordKind};
use crate::db::kv_client::{DeleteOutcome, KvStore, PutOutcome};
use crate::db::models::TagRecord;

use super::{ScannableRepository, fetch_record, store_record};

// --- Tag Repository ---

/// Loads and stores `TagRecord`s by name.
#[derive(Clone)]
pub struct TagRepository {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
}

impl TagRepository {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Store key the tag named `name` lives under.
    pub fn key_for(&self, name: &str) -> String {
        self.keys.tag_key(name)
    }

    pub async fn load(&self, name: &str) -> Result<TagRecord, RepositoryError> {
        if name.is_empty() {
            return Err(RepositoryError::NotFound(name.to_string()));
        }
        self.load_key(&self.keys.tag_key(name)).await
    }

    pub async fn save(&self, tag: &TagRecord) -> Result<PutOutcome, RepositoryError> {
        if tag.name.is_empty() {
            return Err(RepositoryError::InvalidRecord(
                "Can't save a tag without a name".to_string(),
            ));
        }
        let key = self.keys.tag_key(&tag.name);
        let outcome = store_record(self.store.as_ref(), &key, tag).await?;
        debug!(key = %key, ?outcome, urls = tag.url_ids.len(), "Saved tag record.");
        Ok(outcome)
    }

    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome, RepositoryError> {
        Ok(self.store.delete(&self.keys.tag_key(name)).await?)
    }

    /// Loads the tag, or persists and returns a new empty one when the store
    /// reports it absent. Any other failure is returned as is, so an
    /// unreachable store never causes an existing tag to be overwritten.
    pub async fn get_or_create(&self, name: &str) -> Result<TagRecord, RepositoryError> {
        match self.load(name).await {
            Ok(tag) => Ok(tag),
            Err(RepositoryError::NotFound(_)) => {
                let tag = TagRecord::new(name);
                self.save(&tag).await?;
                info!(tag = %name, "Created tag.");
                Ok(tag)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ScannableRepository for TagRepository {
    type Record = TagRecord;

    fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    fn scan_prefix(&self) -> String {
        self.keys.prefix(RecordKind::Tag)
    }

    async fn load_key(&self, key: &str) -> Result<TagRecord, RepositoryError> {
        let tag: TagRecord = fetch_record(self.store.as_ref(), key).await?;
        if tag.name.is_empty() {
            return Err(RepositoryError::NotFound(key.to_string()));
        }
        Ok(tag)
    }
}
