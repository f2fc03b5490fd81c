//! LLM 调用：缓存执行约定的具体实例。
//!
//! # Agent Module
//!
//! [`LlmAgent`] turns a chat completion into a [`crate::execution::CacheableOperation`]:
//! identical prompts (same agent, same model, same sampling settings) are served
//! from the cache, and token usage is reported through the result metadata.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use unicache::agent::{ChatClient, LlmAgent};
//! use unicache::cache::UnifiedCache;
//! use unicache::config::CacheSettings;
//! use unicache::execution::{CachedExecutor, ExecutorConfig};
//!
//! # async fn demo() -> unicache::Result<()> {
//! let cache = Arc::new(UnifiedCache::from_settings(&CacheSettings::from_env())?);
//! cache.connect().await?;
//! let executor = Arc::new(CachedExecutor::new(cache, ExecutorConfig::default()));
//! let agent = LlmAgent::new("summarizer", "gpt-4o-mini", Arc::new(ChatClient::from_env()?), executor);
//!
//! let input = serde_json::json!({"prompt": "Summarize: ..."});
//! let result = agent.run(input.as_object().unwrap()).await;
//! println!("cached={} tokens={:?}", result.cached, result.metadata.total_tokens);
//! # Ok(())
//! # }
//! ```

mod client;
mod llm;
mod types;

pub use client::{ChatClient, DEFAULT_CHAT_TIMEOUT};
pub use llm::LlmAgent;
pub use types::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatRole, Usage};
