//! # unicache
//!
//! 统一缓存层与缓存执行约定：一个键值后端接口、两种网络实现（REST 与原生连接池），
//! 以及"先查缓存、未命中再计算"的执行包装。
//!
//! A unified caching layer and a cached-execution contract for expensive,
//! deterministic calls such as LLM invocations.
//!
//! ## Overview
//!
//! One [`cache::KeyValueBackend`] contract, two network implementations:
//!
//! - [`cache::RestBackend`] sends every operation as one HTTP POST carrying a
//!   command array to a REST key-value endpoint.
//! - [`cache::NativeBackend`] talks to a native key-value server over a shared
//!   connection pool.
//!
//! [`cache::UnifiedCache`] binds exactly one of them at startup and never
//! throws per-operation errors at its callers: a failing cache looks like an
//! empty cache. [`execution::CachedExecutor`] builds on it to run
//! validate → lookup → compute → save for any async computation, and
//! [`agent::LlmAgent`] is the LLM instance of that contract.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use unicache::{CacheSettings, CachedExecutor, Computed, ExecutorConfig, UnifiedCache};
//!
//! #[tokio::main]
//! async fn main() -> unicache::Result<()> {
//!     unicache::logging::init_tracing();
//!
//!     let cache = Arc::new(UnifiedCache::from_settings(&CacheSettings::from_env())?);
//!     cache.connect().await?;
//!
//!     let executor = CachedExecutor::new(cache.clone(), ExecutorConfig::default());
//!     let input = serde_json::json!({"n": 40}).as_object().cloned().unwrap_or_default();
//!     let result = executor
//!         .run("fib", &input, Duration::from_secs(300), |_| Ok(()), |i| async move {
//!             let n = i["n"].as_u64().unwrap_or(0);
//!             Ok::<_, String>(Computed::new(serde_json::json!(n * 2)))
//!         })
//!         .await;
//!     println!("{:?}", result);
//!
//!     cache.disconnect().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Backend contract, REST/native/in-memory backends, facade, key derivation |
//! | [`execution`] | Cached executor and the result envelope |
//! | [`agent`] | Chat-completion client and the cached LLM agent |
//! | [`config`] | Settings and environment loading |
//! | [`logging`] | Tracing subscriber setup |

pub mod agent;
pub mod cache;
pub mod config;
pub mod execution;
pub mod logging;

pub use cache::{BackendKind, CacheStats, KeyValueBackend, UnifiedCache};
pub use config::CacheSettings;
pub use execution::{
    CacheableOperation, CachedExecutor, Computed, ExecutionMetrics, ExecutionResult,
    ExecutorConfig,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
