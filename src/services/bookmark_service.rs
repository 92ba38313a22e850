//! Keeps URL records and tag records pointing at each other.
//!
//! `UrlRecord::tags` (forward references) and `TagRecord::url_ids`
//! (back-references) live under separate keys in a store with no multi-key
//! atomicity. Every operation here is an ordered sequence of single-key
//! calls: old back-references are cleared before new ones are written and the
//! URL record is written last, so a retried operation converges on the
//! consistent state instead of accumulating duplicates.

use chrono::Utc;
use futures_util::TryStreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::error::RepositoryError;
use crate::db::keys::{KeySpace, derive_url_id};
use crate::db::kv_client::{DeleteOutcome, KvStore};
use crate::db::models::{Listing, SkippedKey, TagRecord, UrlRecord};
use crate::db::services::{ScannableRepository, TagRepository, UrlRepository};

use super::tag_parser::{self, TagSyntax};
use super::title_resolver::TitleResolver;

#[derive(Error, Debug)]
pub enum BookmarkError {
    #[error("URL not found: {0}")]
    UrlNotFound(String),
    #[error("Tag not found: {0}")]
    TagNotFound(String),
    #[error("URL is already bookmarked: {0}")]
    UrlAlreadyExists(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn url_lookup(id: &str) -> impl FnOnce(RepositoryError) -> BookmarkError + '_ {
    move |e| match e {
        RepositoryError::NotFound(_) => BookmarkError::UrlNotFound(id.to_string()),
        other => BookmarkError::Repository(other),
    }
}

/// A tag together with the URL records its back-references resolve to.
#[derive(Debug, Clone)]
pub struct TagWithUrls {
    pub tag: TagRecord,
    pub urls: Listing<UrlRecord>,
}

/// What a back-reference sweep touched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepReport {
    /// Tags the URL id was removed from (and which were rewritten).
    pub cleared: Vec<String>,
    /// Tag keys that vanished or could not be decoded mid-sweep.
    pub skipped: Vec<SkippedKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub record: UrlRecord,
    /// Tags listed on the URL record that no longer exist.
    pub missing_tags: Vec<String>,
    /// Tag keys that could not be read back, either listed on the URL record
    /// or met during the sweep. Their references to the URL, if any, remain.
    pub unreadable_tags: Vec<SkippedKey>,
    /// Tags not listed on the URL record that still referenced it.
    pub repaired_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetagReport {
    pub record: UrlRecord,
    /// Tag keys the sweep had to skip.
    pub skipped: Vec<SkippedKey>,
}

pub struct BookmarkService {
    urls: UrlRepository,
    tags: TagRepository,
    titles: Arc<dyn TitleResolver>,
    tag_syntax: TagSyntax,
}

impl BookmarkService {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: KeySpace,
        titles: Arc<dyn TitleResolver>,
        tag_syntax: TagSyntax,
    ) -> Self {
        Self {
            urls: UrlRepository::new(store.clone(), keys.clone()),
            tags: TagRepository::new(store, keys),
            titles,
            tag_syntax,
        }
    }

    pub fn urls(&self) -> &UrlRepository {
        &self.urls
    }

    pub fn tags(&self) -> &TagRepository {
        &self.tags
    }

    /// Creates the record for a URL seen for the first time.
    pub async fn add_url(&self, raw_url: &str) -> Result<UrlRecord, BookmarkError> {
        let url = raw_url.trim();
        if url.is_empty() {
            return Err(BookmarkError::InvalidUrl("URL must not be empty".to_string()));
        }

        let id = derive_url_id(url);
        if self.urls.exists(&id).await? {
            return Err(BookmarkError::UrlAlreadyExists(id));
        }

        let title = self.titles.resolve(url).await;
        let record = UrlRecord::new(url, title, Utc::now());
        self.urls.save(&record).await?;
        info!(id = %record.id, url = %record.url, title = %record.title, "Bookmarked URL.");
        Ok(record)
    }

    pub async fn get_url(&self, id: &str) -> Result<UrlRecord, BookmarkError> {
        self.urls.load(id).await.map_err(url_lookup(id))
    }

    /// All bookmarks, newest first.
    pub async fn list_urls(&self) -> Result<Listing<UrlRecord>, BookmarkError> {
        let mut listing = self.urls.list_all().await?;
        listing
            .items
            .sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(listing)
    }

    /// All tags by name, including ones no URL carries any more.
    pub async fn list_tags(&self) -> Result<Listing<TagRecord>, BookmarkError> {
        let mut listing = self.tags.list_all().await?;
        listing.items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    pub async fn get_tag(&self, name: &str) -> Result<TagRecord, BookmarkError> {
        self.tags.load(name).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => BookmarkError::TagNotFound(name.to_string()),
            other => BookmarkError::Repository(other),
        })
    }

    /// Resolves a tag's back-references. Ids that no longer resolve are
    /// reported, not fatal.
    pub async fn urls_for_tag(&self, name: &str) -> Result<TagWithUrls, BookmarkError> {
        let tag = self.get_tag(name).await?;
        let mut urls = Listing::default();
        for id in &tag.url_ids {
            match self.urls.load(id).await {
                Ok(record) => urls.items.push(record),
                Err(e) => {
                    warn!(tag = %tag.name, url_id = %id, error = %e, "Tag references a URL that does not resolve.");
                    urls.skipped.push(SkippedKey {
                        key: id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(TagWithUrls { tag, urls })
    }

    /// Replaces the URL's tag set with the tags parsed from `raw_tags`.
    ///
    /// 1. load the URL (absent: `UrlNotFound`, nothing written);
    /// 2. remove the URL id from every tag in the store that holds it;
    /// 3. for each desired name: get-or-create the tag, add the id, save it;
    /// 4. save the URL with the new forward references.
    ///
    /// Interrupted between 2 and 4, tags may reference the URL without the URL
    /// listing them. Calling `retag` again repairs that, since step 2 always
    /// starts from a full sweep.
    pub async fn retag(&self, id: &str, raw_tags: &str) -> Result<UrlRecord, BookmarkError> {
        Ok(self.retag_with_report(id, raw_tags).await?.record)
    }

    /// `retag`, also returning the tag keys the sweep skipped.
    pub async fn retag_with_report(
        &self,
        id: &str,
        raw_tags: &str,
    ) -> Result<RetagReport, BookmarkError> {
        let mut record = self.urls.load(id).await.map_err(url_lookup(id))?;
        let desired = tag_parser::normalize(raw_tags, self.tag_syntax);
        debug!(id = %record.id, previous = ?record.tags, desired = ?desired, "Retagging URL.");

        let sweep = self.clear_back_references(&record.id, &[]).await?;

        record.tags.clear();
        for name in desired {
            let mut tag = self.tags.get_or_create(&name).await?;
            tag.add_url(&record.id);
            self.tags.save(&tag).await?;
            record.tags.push(tag.name);
        }

        self.urls.save(&record).await?;
        info!(
            id = %record.id,
            tags = ?record.tags,
            cleared = sweep.cleared.len(),
            skipped = sweep.skipped.len(),
            "Retagged URL."
        );
        Ok(RetagReport {
            record,
            skipped: sweep.skipped,
        })
    }

    /// Removes a URL and every back-reference to it.
    ///
    /// Tags listed on the record are cleared first; a listed tag that no longer
    /// exists or does not decode is skipped with a warning. A sweep over the
    /// remaining tags then catches references a torn `retag` may have left. The URL record is
    /// deleted only after all of that succeeded.
    pub async fn delete_url(&self, id: &str) -> Result<DeleteReport, BookmarkError> {
        let record = self.urls.load(id).await.map_err(url_lookup(id))?;
        let mut missing_tags = Vec::new();
        let mut unreadable_tags: Vec<SkippedKey> = Vec::new();

        for name in &record.tags {
            match self.tags.load(name).await {
                Ok(mut tag) => {
                    if tag.remove_url(&record.id) {
                        self.tags.save(&tag).await?;
                    }
                }
                Err(RepositoryError::NotFound(_)) => {
                    warn!(id = %record.id, tag = %name, "URL lists a tag that does not exist; skipping.");
                    missing_tags.push(name.clone());
                }
                Err(e @ RepositoryError::Decode { .. }) => {
                    warn!(id = %record.id, tag = %name, error = %e, "URL lists a tag that does not decode; skipping.");
                    unreadable_tags.push(SkippedKey {
                        key: self.tags.key_for(name),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let sweep = self.clear_back_references(&record.id, &record.tags).await?;
        for skipped in sweep.skipped {
            if !unreadable_tags.iter().any(|s| s.key == skipped.key) {
                unreadable_tags.push(skipped);
            }
        }
        if !sweep.cleared.is_empty() {
            warn!(id = %record.id, tags = ?sweep.cleared, "Removed dangling back-references.");
        }

        match self.urls.delete(&record.id).await? {
            DeleteOutcome::Deleted => {
                info!(id = %record.id, url = %record.url, "Deleted URL.");
                Ok(DeleteReport {
                    record,
                    missing_tags,
                    unreadable_tags,
                    repaired_tags: sweep.cleared,
                })
            }
            DeleteOutcome::NotFound => Err(BookmarkError::UrlNotFound(record.id)),
        }
    }

    /// Removes `url_id` from every tag in the store except those named in
    /// `already_handled`, saving each tag that changed.
    ///
    /// A tag key that disappears or holds garbage between the scan and the
    /// load is skipped. Any store failure aborts the sweep: skipping an
    /// unreadable tag could leave a stale reference behind.
    async fn clear_back_references(
        &self,
        url_id: &str,
        already_handled: &[String],
    ) -> Result<SweepReport, RepositoryError> {
        let keys: Vec<String> = self
            .tags
            .store()
            .scan_prefix(&self.tags.scan_prefix())
            .await?
            .try_collect()
            .await?;

        let mut report = SweepReport::default();
        for key in keys {
            let mut tag = match self.tags.load_key(&key).await {
                Ok(tag) => tag,
                Err(e @ (RepositoryError::NotFound(_) | RepositoryError::Decode { .. })) => {
                    warn!(key = %key, error = %e, "Skipping tag during reference sweep.");
                    report.skipped.push(SkippedKey {
                        key,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            if already_handled.contains(&tag.name) {
                continue;
            }
            if tag.remove_url(url_id) {
                self.tags.save(&tag).await?;
                report.cleared.push(tag.name);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryKvStore;
    use crate::services::title_resolver::StaticTitleResolver;

    fn service(store: &Arc<MemoryKvStore>) -> BookmarkService {
        BookmarkService::new(
            store.clone(),
            KeySpace::new("sb"),
            Arc::new(StaticTitleResolver("Example Domain".to_string())),
            TagSyntax::Alphanumeric,
        )
    }

    #[tokio::test]
    async fn test_add_url_resolves_title_and_rejects_duplicates() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);

        let record = bookmarks.add_url("  http://example.com ").await.unwrap();
        assert_eq!(record.url, "http://example.com");
        assert_eq!(record.id, "a9b9f");
        assert_eq!(record.title, "Example Domain");
        assert!(record.tags.is_empty());

        let writes = store.write_count().await;
        assert!(matches!(
            bookmarks.add_url("http://example.com").await,
            Err(BookmarkError::UrlAlreadyExists(id)) if id == "a9b9f"
        ));
        assert_eq!(store.write_count().await, writes);

        assert!(matches!(
            bookmarks.add_url("   ").await,
            Err(BookmarkError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_add_url_does_not_treat_unreachable_store_as_absent() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        store.fail_reads_of("sb:url:a9b9f").await;

        assert!(matches!(
            bookmarks.add_url("http://example.com").await,
            Err(BookmarkError::Repository(RepositoryError::Transport(_)))
        ));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_retag_creates_tags_with_back_references() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();

        let tagged = bookmarks.retag(&record.id, "go, rust").await.unwrap();
        assert_eq!(tagged.tags, vec!["go", "rust"]);
        assert_eq!(bookmarks.get_url(&record.id).await.unwrap().tags, vec!["go", "rust"]);
        for name in ["go", "rust"] {
            assert_eq!(bookmarks.get_tag(name).await.unwrap().url_ids, vec![record.id.clone()]);
        }
    }

    #[tokio::test]
    async fn test_retag_with_empty_input_keeps_empty_tags() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go, rust").await.unwrap();

        let untagged = bookmarks.retag(&record.id, "").await.unwrap();
        assert!(untagged.tags.is_empty());
        for name in ["go", "rust"] {
            let tag = bookmarks.get_tag(name).await.unwrap();
            assert!(tag.url_ids.is_empty());
        }
        assert_eq!(bookmarks.list_tags().await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn test_retag_unknown_url_writes_nothing() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);

        assert!(matches!(
            bookmarks.retag("abcde", "go").await,
            Err(BookmarkError::UrlNotFound(id)) if id == "abcde"
        ));
        assert_eq!(store.write_count().await, 0);
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_url_clears_back_references() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go").await.unwrap();

        let report = bookmarks.delete_url(&record.id).await.unwrap();
        assert_eq!(report.record.id, record.id);
        assert!(report.missing_tags.is_empty());
        assert!(report.repaired_tags.is_empty());

        assert!(bookmarks.get_tag("go").await.unwrap().url_ids.is_empty());
        assert!(matches!(
            bookmarks.get_url(&record.id).await,
            Err(BookmarkError::UrlNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_url_skips_missing_tag() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go rust").await.unwrap();
        bookmarks.tags().delete("go").await.unwrap();

        let report = bookmarks.delete_url(&record.id).await.unwrap();
        assert_eq!(report.missing_tags, vec!["go"]);
        assert!(bookmarks.get_tag("rust").await.unwrap().url_ids.is_empty());
        assert!(bookmarks.get_url(&record.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_url_aborts_when_a_tag_is_unreadable() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go").await.unwrap();
        store.fail_reads_of("sb:tag:go").await;

        assert!(matches!(
            bookmarks.delete_url(&record.id).await,
            Err(BookmarkError::Repository(RepositoryError::Transport(_)))
        ));
        store.clear_faults().await;
        assert_eq!(bookmarks.get_url(&record.id).await.unwrap().tags, vec!["go"]);
    }

    #[tokio::test]
    async fn test_delete_url_skips_listed_tag_that_does_not_decode() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go rust").await.unwrap();
        store.insert_raw("sb:tag:go", "not json").await;

        let report = bookmarks.delete_url(&record.id).await.unwrap();
        assert!(report.missing_tags.is_empty());
        assert_eq!(report.unreadable_tags.len(), 1);
        assert_eq!(report.unreadable_tags[0].key, "sb:tag:go");
        assert!(bookmarks.get_tag("rust").await.unwrap().url_ids.is_empty());
        assert!(store.raw("sb:url:a9b9f").await.is_none());
        assert!(matches!(
            bookmarks.get_url(&record.id).await,
            Err(BookmarkError::UrlNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_retag_sweep_skips_undecodable_tag() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go rust").await.unwrap();
        store.insert_raw("sb:tag:broken", "{\"name\": 42}").await;

        let report = bookmarks.retag_with_report(&record.id, "python").await.unwrap();
        assert_eq!(report.record.tags, vec!["python"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, "sb:tag:broken");

        for name in ["go", "rust"] {
            assert!(bookmarks.get_tag(name).await.unwrap().url_ids.is_empty());
        }
        assert_eq!(bookmarks.get_tag("python").await.unwrap().url_ids, vec![record.id.clone()]);
        assert_eq!(bookmarks.get_url(&record.id).await.unwrap().tags, vec!["python"]);
        // Left untouched.
        assert_eq!(
            store.raw("sb:tag:broken").await,
            Some(bytes::Bytes::from_static(b"{\"name\": 42}"))
        );
    }

    #[tokio::test]
    async fn test_retag_sweep_skips_tag_deleted_mid_enumeration() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go").await.unwrap();
        // A blank name reads as absent, as if the key vanished after the scan.
        store.insert_raw("sb:tag:ghost", "{\"name\": \"\", \"urls\": [\"a9b9f\"]}").await;

        let report = bookmarks.retag_with_report(&record.id, "rust").await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, "sb:tag:ghost");
        assert!(bookmarks.get_tag("go").await.unwrap().url_ids.is_empty());
    }

    #[tokio::test]
    async fn test_urls_for_tag_reports_dangling_ids() {
        let store = Arc::new(MemoryKvStore::new());
        let bookmarks = service(&store);
        let record = bookmarks.add_url("http://example.com").await.unwrap();
        bookmarks.retag(&record.id, "go").await.unwrap();

        let mut tag = bookmarks.get_tag("go").await.unwrap();
        tag.add_url("fffff");
        bookmarks.tags().save(&tag).await.unwrap();

        let resolved = bookmarks.urls_for_tag("go").await.unwrap();
        assert_eq!(resolved.urls.items, vec![record]);
        assert_eq!(resolved.urls.skipped.len(), 1);
        assert_eq!(resolved.urls.skipped[0].key, "fffff");

        assert!(matches!(
            bookmarks.urls_for_tag("python").await,
            Err(BookmarkError::TagNotFound(_))
        ));
    }
}
