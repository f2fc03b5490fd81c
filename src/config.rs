//! Cache configuration.
//!
//! Two mutually exclusive profiles select the backend: a REST endpoint plus
//! bearer token, or a native connection URL (with optional password and pool
//! size). Settings are read once and never mutated after `connect`.

use crate::cache::BackendKind;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_POOL_MAX_SIZE: usize = 10;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// REST endpoint of the remote key-value service.
    pub rest_url: Option<String>,
    /// Bearer token for the REST endpoint.
    pub rest_token: Option<String>,
    /// Native connection URL (`redis://host:port/db`).
    pub redis_url: String,
    pub redis_password: Option<String>,
    /// Maximum connections in the native pool.
    pub pool_max_size: usize,
    #[serde(with = "duration_secs")]
    pub http_timeout: Duration,
    /// Default entry TTL for callers that do not pass one. Zero disables caching.
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            rest_url: None,
            rest_token: None,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            redis_password: None,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSettings")
            .field("rest_url", &self.rest_url)
            .field("rest_token", &self.rest_token.as_ref().map(|_| "***"))
            .field("redis_url", &self.redis_url)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "***"))
            .field("pool_max_size", &self.pool_max_size)
            .field("http_timeout", &self.http_timeout)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the process environment.
    ///
    /// - `CACHE_REST_URL` / `CACHE_REST_TOKEN`: REST profile
    /// - `REDIS_URL` / `REDIS_PASSWORD` / `REDIS_MAX_CONNECTIONS`: native profile
    /// - `CACHE_HTTP_TIMEOUT_SECS` (default 10)
    /// - `CACHE_DEFAULT_TTL_SECS` (default 3600; zero or negative disables caching)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rest_url: non_empty_var("CACHE_REST_URL"),
            rest_token: non_empty_var("CACHE_REST_TOKEN"),
            redis_url: non_empty_var("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_password: non_empty_var("REDIS_PASSWORD"),
            pool_max_size: env::var("REDIS_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.pool_max_size),
            http_timeout: env::var("CACHE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            default_ttl: env::var("CACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .map(ttl_from_secs)
                .unwrap_or(defaults.default_ttl),
        }
    }

    pub fn with_rest(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.rest_url = Some(url.into());
        self.rest_token = Some(token.into());
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_redis_password(mut self, password: impl Into<String>) -> Self {
        self.redis_password = Some(password.into());
        self
    }

    pub fn with_pool_max_size(mut self, size: usize) -> Self {
        self.pool_max_size = size;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// REST is selected only when both endpoint and token are present.
    pub fn backend_kind(&self) -> BackendKind {
        match (&self.rest_url, &self.rest_token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => BackendKind::Rest,
            _ => BackendKind::Native,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.backend_kind() {
            BackendKind::Rest => {
                let raw = self.rest_url.as_deref().unwrap_or_default();
                let url = url::Url::parse(raw).map_err(|e| {
                    Error::configuration_with_context(
                        format!("invalid REST endpoint: {}", e),
                        ErrorContext::new().with_key("rest_url"),
                    )
                })?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(Error::configuration_with_context(
                        format!("unsupported REST scheme '{}'", url.scheme()),
                        ErrorContext::new().with_key("rest_url"),
                    ));
                }
            }
            // Selection never yields Memory; it is only bound through `with_backend`.
            BackendKind::Native | BackendKind::Memory => {
                let url = url::Url::parse(&self.redis_url).map_err(|e| {
                    Error::configuration_with_context(
                        format!("invalid native connection URL: {}", e),
                        ErrorContext::new().with_key("redis_url"),
                    )
                })?;
                if url.scheme() != "redis" && url.scheme() != "rediss" {
                    return Err(Error::configuration_with_context(
                        format!("unsupported native scheme '{}'", url.scheme()),
                        ErrorContext::new().with_key("redis_url"),
                    ));
                }
                if self.pool_max_size == 0 {
                    return Err(Error::configuration_with_context(
                        "pool size must be at least 1",
                        ErrorContext::new().with_key("pool_max_size"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Native URL with the configured password applied.
    pub(crate) fn redis_connection_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.redis_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid native connection URL: {}", e),
                ErrorContext::new().with_key("redis_url"),
            )
        })?;
        if let Some(ref password) = self.redis_password {
            url.set_password(Some(password)).map_err(|_| {
                Error::configuration_with_context(
                    "native connection URL cannot carry a password",
                    ErrorContext::new().with_key("redis_password"),
                )
            })?;
        }
        Ok(url.to_string())
    }
}

/// Non-positive TTLs mean "do not cache".
pub fn ttl_from_secs(secs: i64) -> Duration {
    if secs <= 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(secs as u64)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i64::deserialize(deserializer)?;
        Ok(super::ttl_from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_requires_both_url_and_token() {
        let mut settings = CacheSettings::new();
        assert_eq!(settings.backend_kind(), BackendKind::Native);

        settings.rest_url = Some("https://kv.example.com".into());
        assert_eq!(settings.backend_kind(), BackendKind::Native);

        settings.rest_token = Some("secret".into());
        assert_eq!(settings.backend_kind(), BackendKind::Rest);
    }

    #[test]
    fn debug_redacts_secrets() {
        let settings = CacheSettings::new()
            .with_rest("https://kv.example.com", "super-secret")
            .with_redis_password("hunter2");
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn validate_rejects_bad_urls_and_empty_pool() {
        assert!(CacheSettings::new().validate().is_ok());
        assert!(CacheSettings::new()
            .with_redis_url("http://localhost")
            .validate()
            .is_err());
        assert!(CacheSettings::new()
            .with_pool_max_size(0)
            .validate()
            .is_err());
        assert!(CacheSettings::new()
            .with_rest("not a url", "t")
            .validate()
            .is_err());
    }

    #[test]
    fn native_profile_validates_without_rest() {
        let settings = CacheSettings::new()
            .with_redis_url("rediss://cache.internal:6380/1")
            .with_pool_max_size(4);
        assert_ne!(settings.backend_kind(), BackendKind::Memory);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn password_is_injected_into_url() {
        let settings = CacheSettings::new()
            .with_redis_url("redis://cache.internal:6380/2")
            .with_redis_password("pw");
        assert_eq!(
            settings.redis_connection_url().unwrap(),
            "redis://:pw@cache.internal:6380/2"
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{"default_ttl": -5, "pool_max_size": 4}"#).unwrap();
        assert_eq!(settings.default_ttl, Duration::ZERO);
        assert_eq!(settings.pool_max_size, 4);
        assert_eq!(settings.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(settings.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn ttl_from_secs_disables_non_positive() {
        assert_eq!(ttl_from_secs(0), Duration::ZERO);
        assert_eq!(ttl_from_secs(-1), Duration::ZERO);
        assert_eq!(ttl_from_secs(60), Duration::from_secs(60));
    }
}
