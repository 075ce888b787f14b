//! Test doubles shared by the unit tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use http::StatusCode;
use http::header::{CONTENT_LENGTH, HeaderValue};
use parking_lot::Mutex;
use shellcache_proxy::{FetchRequest, FetchResponse, Network, NetworkError};
use shellcache_storage::{
    CacheEntry, CacheKey, CacheStorage, EntryInfo, MemoryStorage, StorageError, StoredResponse,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lifecycle::WorkerHost;

#[derive(Clone)]
enum Reply {
    Respond(StatusCode, String),
    Fail,
}

/// Network double answering from a URL table; unknown URLs fail
#[derive(Default)]
pub struct MockNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).expect("valid status");
        self.replies
            .lock()
            .insert(url.to_string(), Reply::Respond(status, body.to_string()));
    }

    pub fn fail(&self, url: &str) {
        self.replies.lock().insert(url.to_string(), Reply::Fail);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        self.calls.lock().push(request.url.clone());
        let reply = self.replies.lock().get(&request.url).cloned();

        match reply {
            Some(Reply::Respond(status, body)) => {
                let mut response = FetchResponse::new(status, body.clone());
                response
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                Ok(response)
            }
            Some(Reply::Fail) | None => Err(NetworkError::Unreachable(request.url.clone())),
        }
    }
}

/// Memory store that counts every call made against it
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    calls: AtomicUsize,
    puts: Mutex<Vec<CacheKey>>,
}

impl CountingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> Vec<CacheKey> {
        self.puts.lock().clone()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for CountingStorage {
    async fn open(&self, generation: &str) -> Result<(), StorageError> {
        self.hit();
        self.inner.open(generation).await
    }

    async fn get(
        &self,
        generation: &str,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        self.hit();
        self.inner.get(generation, key).await
    }

    async fn put(
        &self,
        generation: &str,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> Result<(), StorageError> {
        self.hit();
        self.puts.lock().push(key.clone());
        self.inner.put(generation, key, entry).await
    }

    async fn delete(&self, generation: &str, key: &CacheKey) -> Result<bool, StorageError> {
        self.hit();
        self.inner.delete(generation, key).await
    }

    async fn list_entries(&self, generation: &str) -> Result<Vec<EntryInfo>, StorageError> {
        self.hit();
        self.inner.list_entries(generation).await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, StorageError> {
        self.hit();
        self.inner.delete_generation(generation).await
    }

    async fn list_generations(&self) -> Result<Vec<String>, StorageError> {
        self.hit();
        self.inner.list_generations().await
    }
}

/// Host double recording the lifecycle signals it receives
#[derive(Default)]
pub struct RecordingHost {
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHost for RecordingHost {
    async fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

/// A cached entry with an explicit size and write time
pub fn sized_entry(body: &str, size: u64, second: u32) -> CacheEntry {
    CacheEntry {
        response: StoredResponse {
            status: 200,
            headers: vec![("content-length".to_string(), size.to_string())],
            body: Bytes::from(body.to_string()),
        },
        size,
        stored_at: at(second),
    }
}

pub fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, second)
        .single()
        .expect("valid timestamp")
}
