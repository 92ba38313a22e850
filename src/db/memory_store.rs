use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::kv_client::{DeleteOutcome, KeyStream, KvError, KvStore, PutOutcome};

#[derive(Default)]
struct Faults {
    rejected_writes: HashSet<String>,
    unreachable_reads: HashSet<String>,
    writes_until_outage: Option<usize>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Bytes>,
    faults: Faults,
    writes: usize,
}

/// In-process `KvStore` with the same contract as the remote store, plus
/// fault injection for exercising torn multi-key updates.
#[derive(Default)]
pub struct MemoryKvStore {
    inner: Mutex<Inner>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put or delete on `key` is answered with a 500.
    pub async fn reject_writes_to(&self, key: &str) {
        self.inner.lock().await.faults.rejected_writes.insert(key.to_string());
    }

    /// Every get on `key` fails as if the connection dropped.
    pub async fn fail_reads_of(&self, key: &str) {
        self.inner.lock().await.faults.unreachable_reads.insert(key.to_string());
    }

    /// Allows `n` more successful writes, then fails every write after them.
    pub async fn fail_after_writes(&self, n: usize) {
        self.inner.lock().await.faults.writes_until_outage = Some(n);
    }

    pub async fn clear_faults(&self) {
        self.inner.lock().await.faults = Faults::default();
    }

    /// Number of successful puts and deletes so far.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    pub async fn insert_raw(&self, key: &str, value: impl Into<Bytes>) {
        self.inner
            .lock()
            .await
            .entries
            .insert(key.to_string(), value.into());
    }

    pub async fn raw(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().await.entries.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.lock().await.entries.keys().cloned().collect()
    }
}

impl Inner {
    fn check_write(&mut self, op: &'static str, key: &str) -> Result<(), KvError> {
        if self.faults.rejected_writes.contains(key) {
            return Err(KvError::UnexpectedStatus {
                op,
                key: key.to_string(),
                status: 500,
            });
        }
        if let Some(remaining) = self.faults.writes_until_outage.as_mut() {
            if *remaining == 0 {
                return Err(KvError::Unavailable(format!("{op} {key}: store went away")));
            }
            *remaining -= 1;
        }
        self.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError> {
        let inner = self.inner.lock().await;
        if inner.faults.unreachable_reads.contains(key) {
            return Err(KvError::Unavailable(format!("get {key}: connection reset")));
        }
        Ok(inner.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<PutOutcome, KvError> {
        let mut inner = self.inner.lock().await;
        inner.check_write("put", key)?;
        match inner.entries.insert(key.to_string(), value) {
            Some(_) => Ok(PutOutcome::Replaced),
            None => Ok(PutOutcome::Created),
        }
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome, KvError> {
        let mut inner = self.inner.lock().await;
        inner.check_write("delete", key)?;
        match inner.entries.remove(key) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<KeyStream, KvError> {
        let inner = self.inner.lock().await;
        let keys: Vec<Result<String, KvError>> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .map(Ok)
            .collect();
        Ok(stream::iter(keys).boxed())
    }
}
