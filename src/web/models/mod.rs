use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Listing, SkippedKey, TagRecord, UrlRecord};
use crate::services::bookmark_service::{RetagReport, TagWithUrls};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUrlRequest {
    pub url: String,
}

/// Tag editor submission: free-form text, the complete new tag set.
#[derive(Debug, Serialize, Deserialize)]
pub struct RetagRequest {
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlResponse {
    pub id: String,
    pub url: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Tags joined for pre-filling the editor.
    pub tags_input: String,
    pub created_at: DateTime<Utc>,
    pub uri: String,
    pub manage_tags_uri: String,
}

impl From<UrlRecord> for UrlResponse {
    fn from(record: UrlRecord) -> Self {
        Self {
            tags_input: record.tags_input(),
            uri: record.uri(),
            manage_tags_uri: record.manage_tags_uri(),
            id: record.id,
            url: record.url,
            title: record.title,
            tags: record.tags,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagResponse {
    pub name: String,
    pub url_ids: Vec<String>,
    pub url_count: usize,
}

impl From<TagRecord> for TagResponse {
    fn from(tag: TagRecord) -> Self {
        Self {
            url_count: tag.url_ids.len(),
            name: tag.name,
            url_ids: tag.url_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SkippedResponse {
    pub key: String,
    pub reason: String,
}

impl From<SkippedKey> for SkippedResponse {
    fn from(skipped: SkippedKey) -> Self {
        Self {
            key: skipped.key,
            reason: skipped.reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UrlListResponse {
    pub urls: Vec<UrlResponse>,
    pub count: usize,
    pub skipped: Vec<SkippedResponse>,
}

impl From<Listing<UrlRecord>> for UrlListResponse {
    fn from(listing: Listing<UrlRecord>) -> Self {
        let urls: Vec<UrlResponse> = listing.items.into_iter().map(Into::into).collect();
        Self {
            count: urls.len(),
            urls,
            skipped: listing.skipped.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagResponse>,
    pub count: usize,
    pub skipped: Vec<SkippedResponse>,
}

impl From<Listing<TagRecord>> for TagListResponse {
    fn from(listing: Listing<TagRecord>) -> Self {
        let tags: Vec<TagResponse> = listing.items.into_iter().map(Into::into).collect();
        Self {
            count: tags.len(),
            tags,
            skipped: listing.skipped.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagDetailResponse {
    pub tag: TagResponse,
    pub urls: Vec<UrlResponse>,
    pub skipped: Vec<SkippedResponse>,
}

impl From<TagWithUrls> for TagDetailResponse {
    fn from(detail: TagWithUrls) -> Self {
        Self {
            tag: detail.tag.into(),
            urls: detail.urls.items.into_iter().map(Into::into).collect(),
            skipped: detail.urls.skipped.into_iter().map(Into::into).collect(),
        }
    }
}

/// A retagged URL plus the tag keys its sweep could not read.
#[derive(Debug, Serialize)]
pub struct RetagResponse {
    #[serde(flatten)]
    pub url: UrlResponse,
    pub skipped: Vec<SkippedResponse>,
}

impl From<RetagReport> for RetagResponse {
    fn from(report: RetagReport) -> Self {
        Self {
            url: report.record.into(),
            skipped: report.skipped.into_iter().map(Into::into).collect(),
        }
    }
}
