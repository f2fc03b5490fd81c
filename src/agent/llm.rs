use super::client::ChatClient;
use super::types::{ChatMessage, ChatRequest};
use crate::execution::{
    CacheableOperation, CachedExecutor, Computed, ExecutionMetrics, ExecutionResult, Input,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// A named LLM call whose completions are cached by input.
///
/// Input fields: `prompt` (required, non-empty string), `system` (optional
/// string), `model` (optional; the agent default is filled in before hashing so
/// that different models never share an entry).
pub struct LlmAgent {
    name: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    ttl: Option<Duration>,
    client: Arc<ChatClient>,
    executor: Arc<CachedExecutor>,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        client: Arc<ChatClient>,
        executor: Arc<CachedExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            ttl: None,
            client,
            executor,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the executor's default TTL. `Duration::ZERO` disables caching.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Input as it will be hashed and sent.
    pub fn prepare(&self, input: &Input) -> Input {
        let mut prepared = input.clone();
        prepared
            .entry("model")
            .or_insert_with(|| Value::String(self.model.clone()));
        if let Some(t) = self.temperature {
            prepared.entry("temperature").or_insert_with(|| json!(t));
        }
        if let Some(m) = self.max_tokens {
            prepared.entry("max_tokens").or_insert_with(|| json!(m));
        }
        prepared
    }

    pub async fn run(&self, input: &Input) -> ExecutionResult {
        let prepared = self.prepare(input);
        self.executor.execute(self, &prepared).await
    }
}

#[async_trait]
impl CacheableOperation for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, input: &Input) -> Result<(), String> {
        match input.get("prompt") {
            Some(Value::String(p)) if !p.trim().is_empty() => {}
            Some(Value::String(_)) => return Err("prompt must not be empty".to_string()),
            Some(_) => return Err("prompt must be a string".to_string()),
            None => return Err("prompt is required".to_string()),
        }
        match input.get("system") {
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
            Some(_) => Err("system must be a string".to_string()),
        }
    }

    fn cache_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    async fn compute(&self, input: &Input) -> crate::Result<Computed> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = input.get("system").and_then(Value::as_str) {
            messages.push(ChatMessage::system(system));
        }
        let prompt = input.get("prompt").and_then(Value::as_str).unwrap_or_default();
        messages.push(ChatMessage::user(prompt));

        let request = ChatRequest {
            model: input
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(&self.model)
                .to_string(),
            messages,
            temperature: input
                .get("temperature")
                .and_then(Value::as_f64)
                .map(|t| t as f32),
            max_tokens: input
                .get("max_tokens")
                .and_then(Value::as_u64)
                .map(|m| m as u32),
        };

        let response = self.client.complete(&request).await?;
        let model = response.model.clone().unwrap_or(request.model);
        let content = response.content().unwrap_or_default().to_string();

        let mut metrics = ExecutionMetrics::new().with_model(model.clone());
        if let Some(usage) = response.usage {
            metrics = metrics.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }
        if let Some(reason) = response
            .choices
            .first()
            .and_then(|c| c.finish_reason.clone())
        {
            metrics = metrics.with_extra("finish_reason", Value::String(reason));
        }

        Ok(Computed::new(json!({ "content": content, "model": model })).with_metrics(metrics))
    }
}
