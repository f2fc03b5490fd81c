//! Cached executor.

use super::result::{Computed, ExecutionMetrics, ExecutionResult};
use crate::cache::{CacheKeyGenerator, UnifiedCache};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub type Input = Map<String, Value>;

/// A deterministic, potentially expensive operation whose results may be cached.
#[async_trait]
pub trait CacheableOperation: Send + Sync {
    /// Operation identifier; becomes the middle segment of the cache key.
    fn name(&self) -> &str;

    /// Reject bad input before any cache or compute work.
    fn validate(&self, _input: &Input) -> std::result::Result<(), String> {
        Ok(())
    }

    /// TTL for this operation's results; `None` uses the executor default.
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }

    async fn compute(&self, input: &Input) -> crate::Result<Computed>;
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub key_prefix: String,
    pub default_ttl: Duration,
    pub salt: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            key_prefix: "agent".to_string(),
            default_ttl: crate::config::DEFAULT_TTL,
            salt: None,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }
}

/// Compute-or-fetch wrapper around a [`UnifiedCache`].
///
/// Every call runs validate → cache lookup → compute → cache save and always
/// reports elapsed time. Caching is fail-open: a cache that errors behaves like
/// an empty cache. There is no single-flight deduplication, so concurrent calls
/// with the same key may all compute and the last write wins. Dropping the
/// returned future does not undo a write that already started.
pub struct CachedExecutor {
    cache: Arc<UnifiedCache>,
    keys: CacheKeyGenerator,
    config: ExecutorConfig,
}

impl CachedExecutor {
    pub fn new(cache: Arc<UnifiedCache>, config: ExecutorConfig) -> Self {
        let mut keys = CacheKeyGenerator::new(config.key_prefix.clone());
        if let Some(ref salt) = config.salt {
            keys = keys.with_salt(salt.clone());
        }
        Self {
            cache,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<UnifiedCache> {
        &self.cache
    }

    /// Cache key `run` would use for `operation` and `input`.
    pub fn cache_key(&self, operation: &str, input: &Input) -> String {
        self.keys.derive(operation, input).to_string()
    }

    /// Run `compute` for `input` unless a cached result exists.
    ///
    /// A zero `ttl` disables caching for this call: the cache is neither read
    /// nor written. Compute errors become a failed result; they never escape.
    pub async fn run<V, F, Fut, E>(
        &self,
        operation: &str,
        input: &Input,
        ttl: Duration,
        validate: V,
        compute: F,
    ) -> ExecutionResult
    where
        V: FnOnce(&Input) -> std::result::Result<(), String>,
        F: FnOnce(Input) -> Fut,
        Fut: Future<Output = std::result::Result<Computed, E>>,
        E: Display,
    {
        let start = Instant::now();

        if let Err(message) = validate(input) {
            debug!(operation, error = %message, "input rejected");
            return ExecutionResult::failure(message, start.elapsed());
        }

        let caching = !ttl.is_zero();
        let key = caching.then(|| self.cache_key(operation, input));

        if let Some(ref key) = key {
            if let Some(data) = self.cache.get(key).await {
                let elapsed = start.elapsed();
                info!(
                    operation,
                    key = key.as_str(),
                    duration_ms = elapsed.as_millis() as u64,
                    "cache hit"
                );
                return ExecutionResult::success(data, true, elapsed, ExecutionMetrics::default());
            }
        }

        match compute(input.clone()).await {
            Ok(Computed { data, metrics }) => {
                if let Some(ref key) = key {
                    if !self.cache.set(key, &data, Some(ttl)).await {
                        warn!(operation, key = key.as_str(), "result computed but not cached");
                    }
                }
                let elapsed = start.elapsed();
                info!(
                    operation,
                    cached = false,
                    duration_ms = elapsed.as_millis() as u64,
                    "computed"
                );
                ExecutionResult::success(data, false, elapsed, metrics)
            }
            Err(e) => {
                let elapsed = start.elapsed();
                warn!(
                    operation,
                    error = %e,
                    duration_ms = elapsed.as_millis() as u64,
                    "compute failed"
                );
                ExecutionResult::failure(e.to_string(), elapsed)
            }
        }
    }

    /// Run a [`CacheableOperation`] with its own validation and TTL.
    pub async fn execute(&self, op: &dyn CacheableOperation, input: &Input) -> ExecutionResult {
        let ttl = op.cache_ttl().unwrap_or(self.config.default_ttl);
        self.run(
            op.name(),
            input,
            ttl,
            |i| op.validate(i),
            |i| async move { op.compute(&i).await },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn executor() -> CachedExecutor {
        let cache = Arc::new(UnifiedCache::with_backend(Arc::new(MemoryBackend::new(100))));
        cache.connect().await.unwrap();
        CachedExecutor::new(cache, ExecutorConfig::default())
    }

    fn input(v: Value) -> Input {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let exec = executor().await;
        let calls = AtomicUsize::new(0);
        let q = input(json!({"q": "hi"}));

        for _ in 0..2 {
            let res = exec
                .run("echo", &q, Duration::from_secs(60), |_| Ok(()), |i| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let echo = i.get("q").cloned().unwrap_or(Value::Null);
                    async move { Ok::<_, String>(Computed::new(json!({ "echo": echo }))) }
                })
                .await;
            assert!(res.success);
            assert_eq!(res.data, Some(json!({"echo": "hi"})));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exec.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn validation_failure_skips_cache_and_compute() {
        let exec = executor().await;
        let calls = AtomicUsize::new(0);
        let res = exec
            .run(
                "echo",
                &input(json!({})),
                Duration::from_secs(60),
                |i| {
                    if i.contains_key("q") {
                        Ok(())
                    } else {
                        Err("q is required".to_string())
                    }
                },
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(Computed::new(json!(null))) }
                },
            )
            .await;
        assert!(!res.success);
        assert_eq!(res.error(), Some("q is required"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(exec.cache().stats(), Default::default());
    }

    #[tokio::test]
    async fn compute_error_becomes_failed_result() {
        let exec = executor().await;
        let q = input(json!({"q": "boom"}));
        let res = exec
            .run("echo", &q, Duration::from_secs(60), |_| Ok(()), |_| async {
                Err::<Computed, _>("upstream exploded")
            })
            .await;
        assert!(!res.success);
        assert!(res.data.is_none());
        assert_eq!(res.error(), Some("upstream exploded"));
        assert!(!exec.cache().exists(&exec.cache_key("echo", &q)).await);
    }
}
