//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unicache::cache::{BackendKind, KeyValueBackend, MemoryBackend, RestBackend, UnifiedCache};
use unicache::{Error, Result};

pub const TOKEN: &str = "test-token";

/// Mock REST key-value endpoint.
pub struct KvServerFixture {
    pub server: ServerGuard,
    pub url: String,
}

impl KvServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let url = server.url();
        Self { server, url }
    }

    pub fn backend(&self) -> RestBackend {
        RestBackend::with_endpoint(self.url.clone(), TOKEN, Duration::from_secs(5))
            .expect("build REST backend")
    }

    /// Reply `{"result": result}` to exactly this command array.
    pub async fn mock_command(&mut self, command: Value, result: Value) -> Mock {
        self.server
            .mock("POST", "/")
            .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
            .match_body(Matcher::Json(command))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "result": result }).to_string())
            .create_async()
            .await
    }

    pub async fn mock_ping(&mut self) -> Mock {
        self.mock_command(json!(["PING"]), json!("PONG")).await
    }

    pub async fn mock_status(&mut self, command: Value, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", "/")
            .match_body(Matcher::Json(command))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Connected REST-backed facade.
    pub async fn connected_cache(&mut self) -> UnifiedCache {
        self.mock_ping().await;
        let cache = UnifiedCache::with_backend(Arc::new(self.backend()));
        cache.connect().await.expect("connect to mock endpoint");
        cache
    }
}

/// In-memory backend that counts calls and can be told to fail.
#[derive(Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    fail_all: AtomicBool,
    fail_keys: Mutex<HashSet<String>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl FlakyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_all(&self, on: bool) {
        self.fail_all.store(on, Ordering::SeqCst);
    }

    pub fn fail_key(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) || self.fail_keys.lock().unwrap().contains(key) {
            return Err(Error::Remote {
                status: 503,
                message: format!("injected failure for {key}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueBackend for FlakyBackend {
    async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.exists(key).await
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        self.check(key)?;
        self.inner.increment(key, amount).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check(key)?;
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.check(key)?;
        self.inner.ttl(key).await
    }

    async fn ping(&self) -> Result<bool> {
        self.check("")?;
        self.inner.ping().await
    }

    async fn flush(&self) -> Result<bool> {
        self.check("")?;
        self.inner.flush().await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &Value) -> Result<bool> {
        self.check(key)?;
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>> {
        self.check(key)?;
        self.inner.hash_get(key, field).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Value>> {
        self.check(key)?;
        self.inner.hash_get_all(key).await
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.hash_delete(key, field).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.check(key)?;
        self.inner.set_members(key).await
    }

    fn supports_scan(&self) -> bool {
        self.inner.supports_scan()
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        self.inner.delete_matching(pattern).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

/// Connected facade over a fresh [`FlakyBackend`].
pub async fn flaky_cache() -> (Arc<FlakyBackend>, Arc<UnifiedCache>) {
    let backend = FlakyBackend::new();
    let cache = Arc::new(UnifiedCache::with_backend(backend.clone()));
    cache.connect().await.expect("memory backend connects");
    (backend, cache)
}

pub fn input(v: Value) -> serde_json::Map<String, Value> {
    v.as_object().cloned().expect("object input")
}
