use deadpool_redis::redis::RedisError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

/// Structured error context for cache and execution failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Cache key (or configuration key) the failure relates to
    pub key: Option<String>,
    /// Additional context about the error (e.g., the command that was sent)
    pub details: Option<String>,
    /// Source of the error (e.g., "rest_backend", "native_backend")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            key: None,
            details: None,
            source: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the cache layer and the execution contract.
///
/// Callers of [`crate::cache::UnifiedCache`] only ever see [`Error::Connection`]
/// (from `connect`) and [`Error::Configuration`]; every per-operation failure is
/// converted into a value-level miss by the facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection to {backend} backend failed: {message}")]
    Connection {
        backend: &'static str,
        message: String,
    },

    #[error("Cache operation failed: {message}{}", format_context(.context))]
    Operation {
        message: String,
        context: ErrorContext,
    },

    #[error("Rate limited by remote service{}", format_retry_after(.retry_after_ms))]
    RateLimited { retry_after_ms: Option<u32> },

    #[error("Remote error: HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Native store error: {0}")]
    Redis(#[from] RedisError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref key) = ctx.key {
        parts.push(format!("key: {}", key));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_retry_after(retry_after_ms: &Option<u32>) -> String {
    match retry_after_ms {
        Some(ms) => format!(" (retry after {} ms)", ms),
        None => String::new(),
    }
}

impl Error {
    pub fn connection(backend: &'static str, msg: impl Into<String>) -> Self {
        Error::Connection {
            backend,
            message: msg.into(),
        }
    }

    pub fn operation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Operation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// HTTP 429 with the wait taken from `Retry-After`.
    pub(crate) fn rate_limited(headers: &HeaderMap) -> Self {
        Error::RateLimited {
            retry_after_ms: retry_after_ms(headers),
        }
    }

    /// True for the distinguished HTTP 429 failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Operation { context, .. }
            | Error::Configuration { context, .. }
            | Error::Validation { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Only the `Retry-After: <seconds>` form is understood.
fn retry_after_ms(headers: &HeaderMap) -> Option<u32> {
    let secs: u32 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(secs.saturating_mul(1000))
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(TransportError::Http(e))
    }
}
