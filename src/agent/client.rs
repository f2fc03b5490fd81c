use super::types::{ChatRequest, ChatResponse};
use crate::error::TransportError;
use crate::{Error, ErrorContext, Result};
use reqwest::StatusCode;
use std::env;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimal client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_CHAT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// `LLM_BASE_URL` (default `https://api.openai.com/v1`), `LLM_API_KEY`,
    /// `LLM_HTTP_TIMEOUT_SECS` (default 60).
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("LLM_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let api_key = env::var("LLM_API_KEY").ok().filter(|s| !s.is_empty());
        let timeout = env::var("LLM_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CHAT_TIMEOUT);
        Self::with_timeout(base_url, api_key, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let request_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();

        let mut req = self
            .client
            .post(&url)
            .json(request)
            .header("x-request-id", &request_id);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let err = Error::rate_limited(resp.headers());
            warn!(request_id = %request_id, model = %request.model, error = %err, "chat completion rate limited");
            return Err(err);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = resp.json().await?;
        debug!(
            request_id = %request_id,
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion ok"
        );
        if body.choices.is_empty() {
            return Err(Error::operation_with_context(
                "chat completion returned no choices",
                ErrorContext::new()
                    .with_details(request_id)
                    .with_source("chat_client"),
            ));
        }
        Ok(body)
    }
}
