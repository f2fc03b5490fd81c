//! Native backend over a pooled connection to a key-value server.

use super::backend::{decode, encode, ttl_secs, BackendKind, KeyValueBackend};
use crate::config::CacheSettings;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

const SCAN_BATCH: usize = 100;

pub struct NativeBackend {
    pool: Pool,
    max_size: usize,
    connected: AtomicBool,
}

impl NativeBackend {
    /// Build the pool. No connection is opened until [`KeyValueBackend::connect`].
    pub fn new(settings: &CacheSettings) -> Result<Self> {
        let url = settings.redis_connection_url()?;
        let mut cfg = Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(settings.pool_max_size.max(1)));
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build connection pool: {}", e),
                ErrorContext::new()
                    .with_key("redis_url")
                    .with_source("native_backend"),
            )
        })?;
        Ok(Self {
            pool,
            max_size: settings.pool_max_size.max(1),
            connected: AtomicBool::new(false),
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    async fn conn(&self) -> Result<Option<Connection>> {
        if !self.is_connected() {
            debug!(backend = "native", "operation skipped: not connected");
            return Ok(None);
        }
        Ok(Some(self.pool.get().await?))
    }
}

#[async_trait]
impl KeyValueBackend for NativeBackend {
    /// Fails once [`disconnect`](KeyValueBackend::disconnect) has closed the
    /// pool; build a new backend to reconnect.
    async fn connect(&self) -> Result<()> {
        if self.pool.is_closed() {
            error!(backend = "native", "connect after disconnect");
            return Err(Error::connection(
                "native",
                "pool closed by disconnect; build a new backend",
            ));
        }
        let mut conn = self.pool.get().await.map_err(|e| {
            error!(backend = "native", error = %e, "connection failed");
            Error::connection("native", e.to_string())
        })?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(backend = "native", error = %e, "ping failed");
                Error::connection("native", e.to_string())
            })?;
        if pong != "PONG" {
            error!(backend = "native", reply = %pong, "unexpected ping reply");
            return Err(Error::connection(
                "native",
                format!("unexpected ping reply: {}", pong),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        info!(backend = "native", pool_max_size = self.max_size, "connected");
        Ok(())
    }

    /// Closes the pool for good. Idle connections are dropped and later
    /// `connect` calls fail.
    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.pool.close();
        info!(backend = "native", "disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.pool.is_closed()
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(None);
        };
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw.and_then(|r| decode("native", key, &r)))
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let raw = encode(value)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(raw);
        if let Some(secs) = ttl_secs(ttl) {
            cmd.arg("EX").arg(secs);
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.as_deref() == Some("OK"))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(None);
        };
        // INCRBY: one round trip, atomic for any amount.
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut conn)
            .await?;
        Ok(Some(value))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let applied: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(None);
        };
        let secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(remaining(secs))
    }

    async fn ping(&self) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }

    async fn flush(&self) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let reply: String = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(reply == "OK")
    }

    async fn hash_set(&self, key: &str, field: &str, value: &Value) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let raw = encode(value)?;
        let _added: i64 = conn.hset(key, field, raw).await?;
        Ok(true)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(None);
        };
        let raw: Option<String> = conn.hget(key, field).await?;
        Ok(raw.and_then(|r| decode("native", key, &r)))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Value>> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(HashMap::new());
        };
        let raw: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(f, r)| decode("native", key, &r).map(|v| (f, v)))
            .collect())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let removed: i64 = conn.hdel(key, field).await?;
        Ok(removed > 0)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(false);
        };
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(Vec::new());
        };
        let mut members: Vec<String> = conn.smembers(key).await?;
        members.sort();
        Ok(members)
    }

    fn supports_scan(&self) -> bool {
        true
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let Some(mut conn) = self.conn().await? else {
            return Ok(0);
        };
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let removed: i64 = conn.del(&keys).await?;
                deleted += removed.max(0) as u64;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        debug!(backend = "native", pattern, deleted, "pattern cleared");
        Ok(deleted)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }
}

/// TTL reply: -2 absent, -1 no expiry, otherwise seconds remaining.
fn remaining(secs: i64) -> Option<Duration> {
    if secs < 0 {
        None
    } else {
        Some(Duration::from_secs(secs as u64))
    }
}
