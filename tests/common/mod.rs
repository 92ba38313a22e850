#![allow(dead_code)]

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use linkbucket::db::{HttpKvStore, KeySpace, KvStore, MemoryKvStore};
use linkbucket::services::{BookmarkService, StaticTitleResolver, TagSyntax};

pub const DB_NAME: &str = "linkbucket";
pub const NAMESPACE: &str = "sb";

/// State of the fake key-value store: raw documents by key.
#[derive(Clone, Default)]
pub struct FakeKvState {
    pub entries: Arc<Mutex<BTreeMap<String, String>>>,
    pub reject_posts: Arc<AtomicBool>,
}

impl FakeKvState {
    pub fn reject_posts(&self, reject: bool) {
        self.reject_posts.store(reject, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

async fn get_key(
    State(state): State<FakeKvState>,
    Path((db, key)): Path<(String, String)>,
) -> Result<String, StatusCode> {
    if db != DB_NAME {
        return Err(StatusCode::NOT_FOUND);
    }
    state.get(&key).await.ok_or(StatusCode::NOT_FOUND)
}

async fn post_key(
    State(state): State<FakeKvState>,
    Path((db, key)): Path<(String, String)>,
    body: Bytes,
) -> StatusCode {
    if db != DB_NAME {
        return StatusCode::NOT_FOUND;
    }
    if state.reject_posts.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    let value = String::from_utf8_lossy(&body).to_string();
    state.entries.lock().await.insert(key, value);
    StatusCode::CREATED
}

async fn delete_key(
    State(state): State<FakeKvState>,
    Path((db, key)): Path<(String, String)>,
) -> StatusCode {
    if db != DB_NAME {
        return StatusCode::NOT_FOUND;
    }
    match state.entries.lock().await.remove(&key) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn match_prefix(
    State(state): State<FakeKvState>,
    Path((db, prefix)): Path<(String, String)>,
) -> Result<String, StatusCode> {
    if db != DB_NAME {
        return Err(StatusCode::NOT_FOUND);
    }
    let entries = state.entries.lock().await;
    let mut body = String::new();
    for key in entries.keys().filter(|k| k.starts_with(&prefix)) {
        body.push_str(key);
        body.push('\n');
    }
    Ok(body)
}

pub fn fake_kv_router(state: FakeKvState) -> Router {
    Router::new()
        .route("/{db}/{key}", get(get_key).post(post_key).delete(delete_key))
        .route("/{db}/{key}/_match", get(match_prefix))
        .with_state(state)
}

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves `router` on an ephemeral localhost port.
pub async fn start_server(router: Router) -> Result<TestServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Ok(TestServer {
        base_url: format!("http://{addr}"),
        handle,
    })
}

pub async fn start_fake_kv() -> Result<(TestServer, FakeKvState)> {
    let state = FakeKvState::default();
    let server = start_server(fake_kv_router(state.clone())).await?;
    Ok((server, state))
}

pub fn http_store(server: &TestServer) -> Result<HttpKvStore> {
    Ok(HttpKvStore::new(
        server.base_url.trim_start_matches("http://"),
        DB_NAME,
        Duration::from_secs(5),
    )?)
}

pub fn bookmarks_over(store: Arc<dyn KvStore>) -> BookmarkService {
    BookmarkService::new(
        store,
        KeySpace::new(NAMESPACE),
        Arc::new(StaticTitleResolver("Example Domain".to_string())),
        TagSyntax::Alphanumeric,
    )
}

pub fn memory_bookmarks() -> (Arc<MemoryKvStore>, BookmarkService) {
    let store = Arc::new(MemoryKvStore::new());
    let bookmarks = bookmarks_over(store.clone());
    (store, bookmarks)
}
