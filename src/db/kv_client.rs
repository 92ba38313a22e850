use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Store returned status {status} for {op} {key}")]
    UnexpectedStatus {
        op: &'static str,
        key: String,
        status: u16,
    },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result of an upsert. The remote store acknowledges every accepted write
/// with 201, so `HttpKvStore` only ever reports `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Keys matching a prefix, produced lazily as the store streams them back.
pub type KeyStream = BoxStream<'static, Result<String, KvError>>;

/// The four primitives the remote key-value store offers. There is no batch,
/// transaction or compare-and-swap operation, every multi-key update is a
/// sequence of independent calls.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `Ok(None)` only when the store positively reports the key as
    /// absent. Any other failure is an error.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<PutOutcome, KvError>;

    async fn delete(&self, key: &str) -> Result<DeleteOutcome, KvError>;

    /// Unordered, finite sequence of keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<KeyStream, KvError>;
}

/// Client for the HTTP key-value store.
///
/// Keys map to `<base>/<db>/<key>`, prefix scans to `<base>/<db>/<prefix>/_match`.
/// Every key is percent-encoded as a single path segment, so the store sees
/// exactly the key we built.
pub struct HttpKvStore {
    client: Client,
    base_url: String,
    db_name: String,
}

impl HttpKvStore {
    pub fn new(store_address: &str, db_name: &str, timeout: Duration) -> Result<Self, KvError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, store_address, db_name))
    }

    pub fn with_client(client: Client, store_address: &str, db_name: &str) -> Self {
        let address = store_address.trim_end_matches('/');
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        Self {
            client,
            base_url,
            db_name: db_name.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn key_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.db_name,
            urlencoding::encode(key)
        )
    }

    fn match_url(&self, prefix: &str) -> String {
        format!("{}/_match", self.key_url(prefix))
    }
}

#[async_trait]
impl KvStore for HttpKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError> {
        let response = self.client.get(self.key_url(key)).send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.bytes().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(KvError::UnexpectedStatus {
                op: "get",
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<PutOutcome, KvError> {
        let response = self
            .client
            .post(self.key_url(key))
            .header(header::CONTENT_TYPE, "application/json")
            .body(value)
            .send()
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(PutOutcome::Created),
            status => Err(KvError::UnexpectedStatus {
                op: "put",
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome, KvError> {
        let response = self.client.delete(self.key_url(key)).send().await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status => Err(KvError::UnexpectedStatus {
                op: "delete",
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<KeyStream, KvError> {
        let response = self.client.get(self.match_url(prefix)).send().await?;
        match response.status() {
            StatusCode::OK => Ok(split_keys(response.bytes_stream())),
            // Some store builds answer an empty match set with 404.
            StatusCode::NOT_FOUND => {
                debug!(prefix = %prefix, "Prefix scan matched nothing.");
                Ok(stream::empty().boxed())
            }
            status => Err(KvError::UnexpectedStatus {
                op: "scan",
                key: prefix.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

struct LineState<S> {
    body: S,
    buffer: Vec<u8>,
    finished: bool,
}

/// Turns a chunked, newline-delimited body into a stream of keys. Blank lines
/// and trailing `\r` are dropped; a body error ends the stream after being
/// yielded once.
pub fn split_keys<S, E>(body: S) -> KeyStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<KvError> + Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                let key = String::from_utf8_lossy(&line[..pos]).trim().to_string();
                if key.is_empty() {
                    continue;
                }
                return Some((Ok(key), state));
            }

            if state.finished {
                if state.buffer.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut state.buffer);
                let key = String::from_utf8_lossy(&rest).trim().to_string();
                if key.is_empty() {
                    return None;
                }
                return Some((Ok(key), state));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((Err(e.into()), state));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}
