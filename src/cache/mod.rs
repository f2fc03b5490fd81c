//! 统一缓存模块：REST 与原生连接池两种后端，启动时按配置择一。
//!
//! # Unified Cache Module
//!
//! A backend-agnostic key-value cache for JSON values with two network
//! implementations behind one facade.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`KeyValueBackend`] | Contract every store implements |
//! | [`RestBackend`] | One HTTP POST per command against a REST key-value endpoint |
//! | [`NativeBackend`] | Pooled connections to a native key-value server |
//! | [`MemoryBackend`] | In-process store for tests and local development |
//! | [`UnifiedCache`] | Facade: backend selection, fail-open CRUD, batch helpers |
//! | [`CacheKeyGenerator`] | Deterministic `<prefix>:<operation>:<hash>` keys |
//!
//! ## Backend selection
//!
//! [`UnifiedCache::from_settings`] binds the REST backend when both a REST
//! endpoint and a token are configured, and the native backend otherwise. The
//! choice is made once; there is no fallback between backends at runtime.
//!
//! ## Guarantees that differ per backend
//!
//! - `increment(key, n)` is a single atomic `INCRBY` on the native backend, but
//!   `n` sequential `INCR` requests on the REST backend (not atomic for `n > 1`).
//! - `clear_pattern` deletes matching keys where the backend can scan keys and is
//!   a warned no-op returning `0` on the REST backend.
//!
//! ## Example
//!
//! ```rust,no_run
//! use unicache::cache::UnifiedCache;
//! use unicache::config::CacheSettings;
//! use std::time::Duration;
//!
//! # async fn demo() -> unicache::Result<()> {
//! let cache = UnifiedCache::from_settings(&CacheSettings::from_env())?;
//! cache.connect().await?;
//!
//! cache
//!     .set("user:1:profile", &serde_json::json!({"name": "Ann"}), Some(Duration::from_secs(60)))
//!     .await;
//! let profile = cache.get("user:1:profile").await;
//!
//! cache.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod key;
mod memory;
mod native;
mod rest;
mod unified;

pub use backend::{BackendKind, KeyValueBackend};
pub use key::{canonical_json, CacheKey, CacheKeyGenerator};
pub use memory::MemoryBackend;
pub use native::NativeBackend;
pub use rest::RestBackend;
pub use unified::{CacheStats, UnifiedCache};
