use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::db::error::RepositoryError;
use crate::db::keys::{KeySpace, RecordKind, derive_url_id, is_url_id};
use crate::db::kv_client::{DeleteOutcome, KvStore, PutOutcome};
use crate::db::models::UrlRecord;

use super::{ScannableRepository, fetch_record, store_record};

/// Loads and stores `UrlRecord`s by their derived id.
#[derive(Clone)]
pub struct UrlRepository {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
}

impl UrlRepository {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// `NotFound` when nothing is stored under the id. Store failures are
    /// reported as such and never folded into `NotFound`.
    pub async fn load(&self, id: &str) -> Result<UrlRecord, RepositoryError> {
        if !is_url_id(id) {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        self.load_key(&self.keys.url_key(id)).await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, RepositoryError> {
        match self.load(id).await {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, record: &UrlRecord) -> Result<PutOutcome, RepositoryError> {
        if record.url.is_empty() {
            return Err(RepositoryError::InvalidRecord(
                "Can't save a URL record without a url".to_string(),
            ));
        }
        if record.id != derive_url_id(&record.url) {
            return Err(RepositoryError::InvalidRecord(format!(
                "Record id {} does not match url {}",
                record.id, record.url
            )));
        }
        let key = self.keys.url_key(&record.id);
        let outcome = store_record(self.store.as_ref(), &key, record).await?;
        debug!(key = %key, ?outcome, tags = record.tags.len(), "Saved URL record.");
        Ok(outcome)
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, RepositoryError> {
        if !is_url_id(id) {
            return Ok(DeleteOutcome::NotFound);
        }
        Ok(self.store.delete(&self.keys.url_key(id)).await?)
    }
}

#[async_trait]
impl ScannableRepository for UrlRepository {
    type Record = UrlRecord;

    fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    fn scan_prefix(&self) -> String {
        self.keys.prefix(RecordKind::Url)
    }

    async fn load_key(&self, key: &str) -> Result<UrlRecord, RepositoryError> {
        let record: UrlRecord = fetch_record(self.store.as_ref(), key).await?;
        // A blank document is what an aborted first write leaves behind.
        if record.url.is_empty() {
            return Err(RepositoryError::NotFound(key.to_string()));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryKvStore;
    use chrono::Utc;

    fn repository() -> (Arc<MemoryKvStore>, UrlRepository) {
        let store = Arc::new(MemoryKvStore::new());
        let repo = UrlRepository::new(store.clone(), KeySpace::new("sb"));
        (store, repo)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (store, repo) = repository();
        let record = UrlRecord::new("http://example.com", "Example Domain", Utc::now());

        assert_eq!(repo.save(&record).await.unwrap(), PutOutcome::Created);
        assert!(store.raw("sb:url:a9b9f").await.is_some());
        assert_eq!(repo.load("a9b9f").await.unwrap(), record);
        assert!(repo.exists("a9b9f").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_rejects_blank_and_mismatched_records() {
        let (_, repo) = repository();
        let blank = UrlRecord::new("", "", Utc::now());
        assert!(matches!(
            repo.save(&blank).await,
            Err(RepositoryError::InvalidRecord(_))
        ));

        let mut forged = UrlRecord::new("http://example.com", "", Utc::now());
        forged.id = "00000".to_string();
        assert!(matches!(
            repo.save(&forged).await,
            Err(RepositoryError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_save_surfaces_store_rejection() {
        let (store, repo) = repository();
        store.reject_writes_to("sb:url:a9b9f").await;
        let record = UrlRecord::new("http://example.com", "", Utc::now());
        assert!(matches!(
            repo.save(&record).await,
            Err(RepositoryError::StoreRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_load_distinguishes_absence_from_transport_failure() {
        let (store, repo) = repository();
        assert!(repo.load("abcde").await.unwrap_err().is_not_found());
        assert!(repo.load("../etc").await.unwrap_err().is_not_found());

        store.fail_reads_of("sb:url:abcde").await;
        assert!(matches!(
            repo.load("abcde").await,
            Err(RepositoryError::Transport(_))
        ));
        assert!(repo.exists("abcde").await.is_err());
    }

    #[tokio::test]
    async fn test_blank_document_reads_as_absent() {
        let (store, repo) = repository();
        store
            .insert_raw(
                "sb:url:abcde",
                r#"{"url":"","hash":"abcde","created_at":"2014-06-01T12:00:00Z"}"#,
            )
            .await;
        assert!(repo.load("abcde").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_all_reports_unresolvable_keys() {
        let (store, repo) = repository();
        let good = UrlRecord::new("http://example.com", "", Utc::now());
        repo.save(&good).await.unwrap();
        store.insert_raw("sb:url:fffff", "not json").await;
        store.insert_raw("sb:tag:go", r#"{"name":"go"}"#).await;

        let listing = repo.list_all().await.unwrap();
        assert_eq!(listing.items, vec![good]);
        assert_eq!(listing.skipped.len(), 1);
        assert_eq!(listing.skipped[0].key, "sb:url:fffff");
        assert!(!listing.is_complete());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_, repo) = repository();
        let record = UrlRecord::new("http://example.com", "", Utc::now());
        repo.save(&record).await.unwrap();
        assert_eq!(repo.delete("a9b9f").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(repo.delete("a9b9f").await.unwrap(), DeleteOutcome::NotFound);
        assert!(repo.load("a9b9f").await.unwrap_err().is_not_found());
    }
}
