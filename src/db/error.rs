use thiserror::Error;

use super::kv_client::KvError;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Store rejected the request: {0}")]
    StoreRejected(String),
    #[error("Store unreachable: {0}")]
    Transport(String),
    #[error("Malformed record at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

impl From<KvError> for RepositoryError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::UnexpectedStatus { .. } => RepositoryError::StoreRejected(err.to_string()),
            KvError::Transport(_) | KvError::Unavailable(_) => {
                RepositoryError::Transport(err.to_string())
            }
        }
    }
}
