//! 缓存执行模块：对确定性、高开销的调用提供"先查缓存、未命中再计算"的统一约定。
//!
//! # Cached Execution Module
//!
//! [`CachedExecutor`] wraps an async computation with input validation, a
//! deterministic cache key, a cache-check/compute/cache-save sequence, timing,
//! and a uniform [`ExecutionResult`] envelope.
//!
//! ## Per-call sequence
//!
//! 1. **Validate**: rejected input ends the call with an error result; the cache
//!    is not consulted.
//! 2. **Lookup**: unless the TTL is zero, the key
//!    `<prefix>:<operation>:<sha256(canonical input)>` is read. A hit ends the
//!    call with `cached = true`.
//! 3. **Compute**: errors become an error result. On success the data is written
//!    back; a failed write is logged and does not fail the call.
//! 4. **Assemble**: elapsed time is recorded on every path.
//!
//! ## Concurrency
//!
//! No locking or single-flight: identical concurrent calls may each compute and
//! each write (last writer wins).
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use unicache::cache::{MemoryBackend, UnifiedCache};
//! use unicache::execution::{CachedExecutor, Computed, ExecutorConfig};
//!
//! # tokio_test::block_on(async {
//! let cache = Arc::new(UnifiedCache::with_backend(Arc::new(MemoryBackend::default())));
//! cache.connect().await.unwrap();
//! let executor = CachedExecutor::new(cache, ExecutorConfig::default());
//!
//! let input = serde_json::json!({"q": "hi"}).as_object().cloned().unwrap();
//! let result = executor
//!     .run("echo", &input, Duration::from_secs(60), |_| Ok(()), |i| async move {
//!         Ok::<_, String>(Computed::new(serde_json::Value::Object(i)))
//!     })
//!     .await;
//! assert!(result.success);
//! assert!(!result.cached);
//! # });
//! ```

mod executor;
mod result;

pub use executor::{CacheableOperation, CachedExecutor, ExecutorConfig, Input};
pub use result::{Computed, ExecutionMetrics, ExecutionResult};
