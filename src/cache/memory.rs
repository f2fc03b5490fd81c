//! In-process backend.
//!
//! Same semantics as the network backends (TTL expiry, integer increment,
//! hashes, sets, glob scan), used for tests and single-node development.
//! Entries live in an LRU map bounded by `max_entries`; reads promote, and
//! inserting a new key at capacity evicts the least recently used one.

use super::backend::{decode, encode, BackendKind, KeyValueBackend};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
enum Stored {
    Scalar(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Stored, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.filter(|d| !d.is_zero()).map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }
}

pub struct MemoryBackend {
    entries: Mutex<LruCache<String, Entry>>,
    connected: AtomicBool,
}

impl MemoryBackend {
    /// A zero capacity is raised to one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            connected: AtomicBool::new(false),
        }
    }

    fn wrong_type(key: &str) -> Error {
        Error::operation_with_context(
            "operation against a key holding the wrong kind of value",
            ErrorContext::new().with_key(key).with_source("memory_backend"),
        )
    }

    /// Live entry for `key`, promoted to most recently used. An expired entry
    /// is dropped first.
    fn live<'a>(entries: &'a mut LruCache<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        if entries.peek(key).map(Entry::is_expired).unwrap_or(false) {
            entries.pop(key);
        }
        entries.get_mut(key)
    }

    /// Every insert goes through here so the capacity bound holds for all
    /// value kinds.
    fn insert(entries: &mut LruCache<String, Entry>, key: &str, entry: Entry) {
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                debug!(key = %evicted, "memory backend evicted least recently used entry");
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if !self.is_connected() {
            return Ok(None);
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => match &entry.value {
                Stored::Scalar(raw) => Ok(decode("memory", key, raw)),
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let raw = encode(value)?;
        let mut entries = self.entries.lock().await;
        Self::insert(&mut entries, key, Entry::new(Stored::Scalar(raw), ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().await;
        Ok(entries.pop(key).map(|e| !e.is_expired()).unwrap_or(false))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().await;
        match entries.peek(key).map(Entry::is_expired) {
            Some(true) => {
                entries.pop(key);
                Ok(false)
            }
            Some(false) => Ok(true),
            None => Ok(false),
        }
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        if !self.is_connected() {
            return Ok(None);
        }
        let overflow = || {
            Error::operation_with_context(
                "increment would overflow",
                ErrorContext::new().with_key(key).with_source("memory_backend"),
            )
        };
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live(&mut entries, key) {
            let current = match &entry.value {
                Stored::Scalar(raw) => raw.trim().parse::<i64>().map_err(|_| Self::wrong_type(key))?,
                _ => return Err(Self::wrong_type(key)),
            };
            let next = current.checked_add(amount).ok_or_else(overflow)?;
            // Existing expiry is kept.
            entry.value = Stored::Scalar(next.to_string());
            return Ok(Some(next));
        }
        let next = 0i64.checked_add(amount).ok_or_else(overflow)?;
        Self::insert(&mut entries, key, Entry::new(Stored::Scalar(next.to_string()), None));
        Ok(Some(next))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        if !self.is_connected() {
            return Ok(None);
        }
        let mut entries = self.entries.lock().await;
        Ok(Self::live(&mut entries, key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now())))
    }

    async fn ping(&self) -> Result<bool> {
        Ok(self.is_connected())
    }

    async fn flush(&self) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        self.entries.lock().await.clear();
        Ok(true)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &Value) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let raw = encode(value)?;
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live(&mut entries, key) {
            return match &mut entry.value {
                Stored::Hash(map) => {
                    map.insert(field.to_string(), raw);
                    Ok(true)
                }
                _ => Err(Self::wrong_type(key)),
            };
        }
        let map = HashMap::from([(field.to_string(), raw)]);
        Self::insert(&mut entries, key, Entry::new(Stored::Hash(map), None));
        Ok(true)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>> {
        if !self.is_connected() {
            return Ok(None);
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => match &entry.value {
                Stored::Hash(map) => Ok(map.get(field).and_then(|raw| decode("memory", key, raw))),
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(None),
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Value>> {
        if !self.is_connected() {
            return Ok(HashMap::new());
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => match &entry.value {
                Stored::Hash(map) => Ok(map
                    .iter()
                    .filter_map(|(f, raw)| decode("memory", key, raw).map(|v| (f.clone(), v)))
                    .collect()),
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => match &mut entry.value {
                Stored::Hash(map) => Ok(map.remove(field).is_some()),
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(false),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live(&mut entries, key) {
            return match &mut entry.value {
                Stored::Set(set) => Ok(set.insert(member.to_string())),
                _ => Err(Self::wrong_type(key)),
            };
        }
        let set = HashSet::from([member.to_string()]);
        Self::insert(&mut entries, key, Entry::new(Stored::Set(set), None));
        Ok(true)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => match &mut entry.value {
                Stored::Set(set) => Ok(set.remove(member)),
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(false),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        if !self.is_connected() {
            return Ok(Vec::new());
        }
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => match &entry.value {
                Stored::Set(set) => {
                    let mut members: Vec<String> = set.iter().cloned().collect();
                    members.sort();
                    Ok(members)
                }
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(Vec::new()),
        }
    }

    fn supports_scan(&self) -> bool {
        true
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        if !self.is_connected() {
            return Ok(0);
        }
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            Error::validation_with_context(
                format!("invalid key pattern: {}", e),
                ErrorContext::new().with_key(pattern).with_source("memory_backend"),
            )
        })?;
        let mut entries = self.entries.lock().await;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.is_expired() || matcher.matches(k.as_str()))
            .map(|(k, _)| k.clone())
            .collect();
        let mut removed = 0u64;
        for key in doomed {
            if let Some(entry) = entries.pop(&key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
