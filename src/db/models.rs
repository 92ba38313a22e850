use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::keys::derive_url_id;

/// Older records were written with `null` for an empty list.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A bookmarked URL, stored at `<ns>:url:<id>`.
///
/// Field names on the wire are kept as the existing store documents have
/// them (`url_title`, `hash`, `created_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    #[serde(rename = "url_title", default)]
    pub title: String,
    #[serde(rename = "hash")]
    pub id: String,
    /// Forward references, in the order they were assigned.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UrlRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let url = url.into();
        let id = derive_url_id(&url);
        Self {
            url,
            title: title.into(),
            id,
            tags: Vec::new(),
            created_at,
        }
    }

    pub fn uri(&self) -> String {
        format!("/api/urls/{}", self.id)
    }

    pub fn manage_tags_uri(&self) -> String {
        format!("{}/tags", self.uri())
    }

    /// Tags joined the way the tag editor expects them back.
    pub fn tags_input(&self) -> String {
        self.tags.join(", ")
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t == name)
    }
}

/// A tag, stored at `<ns>:tag:<escaped name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    /// Back-references: ids of the URLs carrying this tag.
    #[serde(rename = "urls", default, deserialize_with = "null_as_empty")]
    pub url_ids: Vec<String>,
}

impl TagRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_ids: Vec::new(),
        }
    }

    pub fn has_url(&self, url_id: &str) -> bool {
        self.url_ids.iter().any(|id| id == url_id)
    }

    /// Returns `false` when the id was already present.
    pub fn add_url(&mut self, url_id: &str) -> bool {
        if self.has_url(url_id) {
            return false;
        }
        self.url_ids.push(url_id.to_string());
        true
    }

    /// Removes every occurrence of `url_id`. Returns whether anything changed.
    pub fn remove_url(&mut self, url_id: &str) -> bool {
        let before = self.url_ids.len();
        self.url_ids.retain(|id| id != url_id);
        self.url_ids.len() != before
    }
}

/// A key that showed up in a prefix scan but could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedKey {
    pub key: String,
    pub reason: String,
}

/// Result of a best-effort enumeration: everything that resolved, and what
/// did not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub skipped: Vec<SkippedKey>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Listing<T> {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
