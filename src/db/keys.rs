//! Storage key derivation.
//!
//! Keys have the shape `<namespace>:<kind>:<identifier>`. URL records are
//! addressed by a short content hash of the URL, tag records by their name.

use std::borrow::Cow;

/// Hex characters kept from the URL digest.
pub const URL_ID_LEN: usize = 5;

const KEY_DELIMITER: char = ':';

/// Short, deterministic id for a URL: the first [`URL_ID_LEN`] hex characters
/// of its MD5 digest. Collisions are possible and are not detected here.
pub fn derive_url_id(url: &str) -> String {
    let digest = md5::compute(url.as_bytes());
    let mut id = hex::encode(digest.0);
    id.truncate(URL_ID_LEN);
    id
}

/// Whether `id` has the shape produced by [`derive_url_id`].
pub fn is_url_id(id: &str) -> bool {
    id.len() == URL_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Tag names may carry punctuation, including the key delimiter. Escaping
/// keeps the name-to-key mapping injective.
fn escape_tag_name(name: &str) -> Cow<'_, str> {
    urlencoding::encode(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Url,
    Tag,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Url => "url",
            RecordKind::Tag => "tag",
        }
    }
}

/// Builds keys under one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `<namespace>:<kind>:`, the scan prefix for every record of `kind`.
    pub fn prefix(&self, kind: RecordKind) -> String {
        format!(
            "{ns}{d}{kind}{d}",
            ns = self.namespace,
            d = KEY_DELIMITER,
            kind = kind.as_str()
        )
    }

    pub fn url_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix(RecordKind::Url), id)
    }

    pub fn url_key_for(&self, url: &str) -> String {
        self.url_key(&derive_url_id(url))
    }

    pub fn tag_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix(RecordKind::Tag), escape_tag_name(name))
    }
}
