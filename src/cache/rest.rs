//! REST backend.
//!
//! Every operation is a single HTTP POST whose body is the command as a JSON
//! array of string tokens (`["SET", "k", "v", "EX", "60"]`); the reply is
//! `{"result": ...}` or `{"error": "..."}`.
//!
//! The protocol has no increment-by-amount primitive, so
//! [`KeyValueBackend::increment`] issues `amount` sequential `INCR` calls and
//! reports the last reply. This is not atomic for `amount > 1` when other
//! clients write the same key concurrently.

use super::backend::{decode, encode, ttl_secs, BackendKind, KeyValueBackend};
use crate::config::CacheSettings;
use crate::error::TransportError;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

pub struct RestBackend {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    connected: AtomicBool,
}

impl RestBackend {
    pub fn new(settings: &CacheSettings) -> Result<Self> {
        let (endpoint, token) = match (&settings.rest_url, &settings.rest_token) {
            (Some(url), Some(token)) => (url.clone(), token.clone()),
            _ => {
                return Err(Error::configuration_with_context(
                    "REST backend requires both endpoint and token",
                    ErrorContext::new()
                        .with_key("rest_url")
                        .with_source("rest_backend"),
                ))
            }
        };
        Self::with_endpoint(endpoint, token, settings.http_timeout)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        let endpoint: String = endpoint.into();
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.into(),
            connected: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one command and return the raw `result` field.
    ///
    /// HTTP 429 maps to [`Error::RateLimited`] and is not retried.
    pub async fn execute(&self, command: &[String]) -> Result<Value> {
        let start = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(command)
            .send()
            .await?;

        let status = resp.status();
        let verb = command.first().map(String::as_str).unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let err = Error::rate_limited(resp.headers());
            warn!(
                backend = "rest",
                command = verb,
                error = %err,
                "rate limited by REST backend"
            );
            return Err(err);
        }

        let body = resp.text().await?;
        if !status.is_success() {
            // Error replies still carry {"error": "..."} when the service can parse the command.
            let message = serde_json::from_str::<Reply>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            debug!(
                backend = "rest",
                command = verb,
                http_status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "command failed"
            );
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let reply: Reply = serde_json::from_str(&body)?;
        if let Some(message) = reply.error {
            return Err(Error::operation_with_context(
                message,
                ErrorContext::new()
                    .with_details(verb.to_string())
                    .with_source("rest_backend"),
            ));
        }
        debug!(
            backend = "rest",
            command = verb,
            duration_ms = start.elapsed().as_millis() as u64,
            "command ok"
        );
        Ok(reply.result)
    }

    /// Run a command only when connected; `None` otherwise.
    async fn run(&self, command: Vec<String>) -> Result<Option<Value>> {
        if !self.is_connected() {
            debug!(backend = "rest", "operation skipped: not connected");
            return Ok(None);
        }
        self.execute(&command).await.map(Some)
    }
}

fn cmd<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn as_int(key: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| {
            Error::operation_with_context(
                format!("expected integer reply, got {}", value),
                ErrorContext::new().with_key(key).with_source("rest_backend"),
            )
        })
}

fn as_strings(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl KeyValueBackend for RestBackend {
    async fn connect(&self) -> Result<()> {
        match self.execute(&cmd(["PING"])).await {
            Ok(Value::String(ref pong)) if pong == "PONG" => {
                self.connected.store(true, Ordering::SeqCst);
                info!(backend = "rest", endpoint = %self.endpoint, "connected");
                Ok(())
            }
            Ok(other) => {
                error!(backend = "rest", reply = %other, "unexpected ping reply");
                Err(Error::connection(
                    "rest",
                    format!("unexpected ping reply: {}", other),
                ))
            }
            Err(e) => {
                error!(backend = "rest", error = %e, "connection failed");
                Err(Error::connection("rest", e.to_string()))
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        // Stateless protocol: nothing to tear down beyond refusing further calls.
        self.connected.store(false, Ordering::SeqCst);
        info!(backend = "rest", "disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.run(cmd(["GET", key])).await? {
            Some(Value::String(raw)) => Ok(decode("rest", key, &raw)),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        let raw = encode(value)?;
        let mut command = cmd(["SET", key, raw.as_str()]);
        if let Some(secs) = ttl_secs(ttl) {
            command.push("EX".to_string());
            command.push(secs.to_string());
        }
        Ok(matches!(self.run(command).await?, Some(Value::String(ref ok)) if ok == "OK"))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match self.run(cmd(["DEL", key])).await? {
            Some(v) => Ok(as_int(key, &v)? > 0),
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.run(cmd(["EXISTS", key])).await? {
            Some(v) => Ok(as_int(key, &v)? > 0),
            None => Ok(false),
        }
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        if amount <= 0 {
            warn!(backend = "rest", key, amount, "increment amount must be positive");
            return Ok(None);
        }
        let mut last = None;
        for _ in 0..amount {
            match self.run(cmd(["INCR", key])).await? {
                Some(v) => last = Some(as_int(key, &v)?),
                None => return Ok(None),
            }
        }
        Ok(last)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let secs = ttl.as_secs().max(1).to_string();
        match self.run(cmd(["EXPIRE", key, secs.as_str()])).await? {
            Some(v) => Ok(as_int(key, &v)? == 1),
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        match self.run(cmd(["TTL", key])).await? {
            Some(v) => {
                let secs = as_int(key, &v)?;
                Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<bool> {
        Ok(matches!(
            self.run(cmd(["PING"])).await?,
            Some(Value::String(ref pong)) if pong == "PONG"
        ))
    }

    async fn flush(&self) -> Result<bool> {
        Ok(matches!(
            self.run(cmd(["FLUSHDB"])).await?,
            Some(Value::String(ref ok)) if ok == "OK"
        ))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &Value) -> Result<bool> {
        let raw = encode(value)?;
        match self.run(cmd(["HSET", key, field, raw.as_str()])).await? {
            Some(v) => {
                as_int(key, &v)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Value>> {
        match self.run(cmd(["HGET", key, field])).await? {
            Some(Value::String(raw)) => Ok(decode("rest", key, &raw)),
            _ => Ok(None),
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Value>> {
        let Some(reply) = self.run(cmd(["HGETALL", key])).await? else {
            return Ok(HashMap::new());
        };
        // Flat [field, value, field, value, ...] reply.
        let flat = as_strings(reply);
        Ok(flat
            .chunks_exact(2)
            .filter_map(|pair| decode("rest", key, &pair[1]).map(|v| (pair[0].clone(), v)))
            .collect())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool> {
        match self.run(cmd(["HDEL", key, field])).await? {
            Some(v) => Ok(as_int(key, &v)? > 0),
            None => Ok(false),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        match self.run(cmd(["SADD", key, member])).await? {
            Some(v) => Ok(as_int(key, &v)? > 0),
            None => Ok(false),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        match self.run(cmd(["SREM", key, member])).await? {
            Some(v) => Ok(as_int(key, &v)? > 0),
            None => Ok(false),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut members = self
            .run(cmd(["SMEMBERS", key]))
            .await?
            .map(as_strings)
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_replies_accept_numbers_and_strings() {
        assert_eq!(as_int("k", &json!(3)).unwrap(), 3);
        assert_eq!(as_int("k", &json!("4")).unwrap(), 4);
        assert!(as_int("k", &json!("four")).is_err());
    }

    #[test]
    fn requires_endpoint_and_token() {
        let settings = CacheSettings::new();
        assert!(matches!(
            RestBackend::new(&settings),
            Err(Error::Configuration { .. })
        ));
        let settings = settings.with_rest("https://kv.example.com/", "token");
        let backend = RestBackend::new(&settings).unwrap();
        assert_eq!(backend.endpoint(), "https://kv.example.com");
        assert!(!backend.is_connected());
    }

    #[test]
    fn string_arrays_skip_nulls() {
        assert_eq!(
            as_strings(json!(["a", null, 2])),
            vec!["a".to_string(), "2".to_string()]
        );
        assert!(as_strings(json!("nope")).is_empty());
    }
}
