//! Key-value backend contract.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Which concrete store a [`crate::cache::UnifiedCache`] is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Stateless HTTP command endpoint.
    Rest,
    /// Pooled connection to a native key-value server.
    Native,
    /// In-process store (tests and local development).
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Rest => "rest",
            BackendKind::Native => "native",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal contract every concrete store satisfies.
///
/// Values are JSON documents. Implementations report "not connected" and
/// undecodable payloads as misses (`Ok(None)` / `Ok(false)`); transport and
/// protocol failures surface as `Err` and are turned into misses by the facade.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Establish connectivity. Fails with [`crate::Error::Connection`].
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// Store `value` under `key`. `None` or a zero TTL stores without expiry.
    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Add `amount` to the integer at `key`, creating it at 0 first.
    async fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
    /// Remaining lifetime; `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
    async fn ping(&self) -> Result<bool>;
    /// Drop every key in the current database.
    async fn flush(&self) -> Result<bool>;

    async fn hash_set(&self, key: &str, field: &str, value: &Value) -> Result<bool>;
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>>;
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Value>>;
    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool>;

    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Whether the store exposes a key-scan primitive.
    fn supports_scan(&self) -> bool {
        false
    }

    /// Delete every key matching a glob-style `pattern`, returning the count.
    async fn delete_matching(&self, _pattern: &str) -> Result<u64> {
        Ok(0)
    }

    fn kind(&self) -> BackendKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Encode a value for storage. Only JSON-representable values are stored.
pub(crate) fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a stored payload; corrupt payloads are logged and treated as misses.
pub(crate) fn decode(backend: &'static str, key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(backend, key, error = %e, "discarding undecodable cache payload");
            None
        }
    }
}

/// TTL in whole seconds (at least one), or `None` when the entry should not expire.
pub(crate) fn ttl_secs(ttl: Option<Duration>) -> Option<u64> {
    ttl.filter(|d| !d.is_zero()).map(|d| d.as_secs().max(1))
}
