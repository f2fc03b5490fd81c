//! Cache facade.

use super::backend::{BackendKind, KeyValueBackend};
use super::native::NativeBackend;
use super::rest::RestBackend;
use crate::config::CacheSettings;
use crate::Result;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Single entry point to the configured key-value store.
///
/// Exactly one backend is bound for the lifetime of the handle; there is no
/// failover between backends. Per-operation failures are logged and reported as
/// misses (`None` / `false`) so that callers can always fall back to computing.
pub struct UnifiedCache {
    backend: Arc<dyn KeyValueBackend>,
    stats: AtomicStats,
}

impl UnifiedCache {
    /// Pick the backend for `settings`: REST when both endpoint and token are
    /// configured, native otherwise. No network I/O happens here.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        settings.validate()?;
        let backend: Arc<dyn KeyValueBackend> = match settings.backend_kind() {
            BackendKind::Rest => Arc::new(RestBackend::new(settings)?),
            _ => Arc::new(NativeBackend::new(settings)?),
        };
        info!(backend = backend.name(), "cache backend selected");
        Ok(Self::with_backend(backend))
    }

    pub fn with_backend(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            stats: AtomicStats::new(),
        }
    }

    /// Connect the selected backend. Connection failures propagate.
    pub async fn connect(&self) -> Result<()> {
        self.backend.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.backend.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    fn record_error(&self, op: &'static str, key: &str, err: &crate::Error) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            backend = self.backend.name(),
            operation = op,
            key,
            rate_limited = err.is_rate_limited(),
            error = %err,
            "cache operation failed"
        );
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.backend.get(key).await {
            Ok(Some(v)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.record_error("get", key, &e);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> bool {
        match self.backend.set(key, value, ttl).await {
            Ok(stored) => {
                if stored {
                    self.stats.sets.fetch_add(1, Ordering::Relaxed);
                }
                stored
            }
            Err(e) => {
                self.record_error("set", key, &e);
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(deleted) => {
                if deleted {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                deleted
            }
            Err(e) => {
                self.record_error("delete", key, &e);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.backend.exists(key).await.unwrap_or_else(|e| {
            self.record_error("exists", key, &e);
            false
        })
    }

    pub async fn increment(&self, key: &str, amount: i64) -> Option<i64> {
        self.backend
            .increment(key, amount)
            .await
            .unwrap_or_else(|e| {
                self.record_error("increment", key, &e);
                None
            })
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> bool {
        self.backend.expire(key, ttl).await.unwrap_or_else(|e| {
            self.record_error("expire", key, &e);
            false
        })
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.backend.ttl(key).await.unwrap_or_else(|e| {
            self.record_error("ttl", key, &e);
            None
        })
    }

    pub async fn ping(&self) -> bool {
        self.backend.ping().await.unwrap_or_else(|e| {
            self.record_error("ping", "", &e);
            false
        })
    }

    pub async fn flush(&self) -> bool {
        self.backend.flush().await.unwrap_or_else(|e| {
            self.record_error("flush", "", &e);
            false
        })
    }

    pub async fn hash_set(&self, key: &str, field: &str, value: &Value) -> bool {
        self.backend
            .hash_set(key, field, value)
            .await
            .unwrap_or_else(|e| {
                self.record_error("hash_set", key, &e);
                false
            })
    }

    pub async fn hash_get(&self, key: &str, field: &str) -> Option<Value> {
        self.backend.hash_get(key, field).await.unwrap_or_else(|e| {
            self.record_error("hash_get", key, &e);
            None
        })
    }

    pub async fn hash_get_all(&self, key: &str) -> HashMap<String, Value> {
        self.backend.hash_get_all(key).await.unwrap_or_else(|e| {
            self.record_error("hash_get_all", key, &e);
            HashMap::new()
        })
    }

    pub async fn hash_delete(&self, key: &str, field: &str) -> bool {
        self.backend
            .hash_delete(key, field)
            .await
            .unwrap_or_else(|e| {
                self.record_error("hash_delete", key, &e);
                false
            })
    }

    pub async fn set_add(&self, key: &str, member: &str) -> bool {
        self.backend.set_add(key, member).await.unwrap_or_else(|e| {
            self.record_error("set_add", key, &e);
            false
        })
    }

    pub async fn set_remove(&self, key: &str, member: &str) -> bool {
        self.backend
            .set_remove(key, member)
            .await
            .unwrap_or_else(|e| {
                self.record_error("set_remove", key, &e);
                false
            })
    }

    pub async fn set_members(&self, key: &str) -> Vec<String> {
        self.backend.set_members(key).await.unwrap_or_else(|e| {
            self.record_error("set_members", key, &e);
            Vec::new()
        })
    }

    /// One `get` per key. Keys that are absent (or failed) are left out.
    pub async fn get_many<S: AsRef<str>>(&self, keys: &[S]) -> HashMap<String, Value> {
        let lookups = keys.iter().map(|k| async move {
            let key = k.as_ref();
            self.get(key).await.map(|v| (key.to_string(), v))
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    /// One `set` per entry. True only if every write succeeded; entries that
    /// were written before a failure are not rolled back.
    pub async fn set_many(&self, entries: &HashMap<String, Value>, ttl: Option<Duration>) -> bool {
        let writes = entries
            .iter()
            .map(|(k, v)| async move { self.set(k, v, ttl).await });
        join_all(writes).await.into_iter().all(|ok| ok)
    }

    /// Delete keys matching `pattern` where the backend can scan keys.
    ///
    /// Backends without a scan primitive (REST) log a warning and report zero.
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        if !self.backend.supports_scan() {
            warn!(
                backend = self.backend.name(),
                pattern, "pattern clear is not supported by this backend; nothing deleted"
            );
            return 0;
        }
        match self.backend.delete_matching(pattern).await {
            Ok(n) => {
                self.stats.deletes.fetch_add(n, Ordering::Relaxed);
                n
            }
            Err(e) => {
                self.record_error("clear_pattern", pattern, &e);
                0
            }
        }
    }
}
