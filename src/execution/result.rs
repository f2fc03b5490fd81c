//! Execution result envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-call measurements produced by a computation (token usage for LLM calls).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Anything else the operation wants to report.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tokens(mut self, prompt: u64, completion: u64) -> Self {
        self.prompt_tokens = Some(prompt);
        self.completion_tokens = Some(completion);
        self.total_tokens = Some(prompt.saturating_add(completion));
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// What a computation hands back: the cacheable data plus its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub data: Value,
    pub metrics: ExecutionMetrics,
}

impl Computed {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            metrics: ExecutionMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: ExecutionMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Uniform outcome of a cached execution.
///
/// Built only through [`ExecutionResult::success`] / [`ExecutionResult::failure`]
/// so that a successful result never carries an error and a failed one never
/// carries data. Deserialization enforces the same rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExecutionResult")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "execution_time_ms", with = "duration_ms")]
    pub execution_time: Duration,
    pub cached: bool,
    #[serde(default)]
    pub metadata: ExecutionMetrics,
}

impl ExecutionResult {
    pub fn success(
        data: Value,
        cached: bool,
        execution_time: Duration,
        metadata: ExecutionMetrics,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            execution_time,
            cached,
            metadata,
        }
    }

    pub fn failure(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            execution_time,
            cached: false,
            metadata: ExecutionMetrics::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Consume into a plain `Result`.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match (self.data, self.error) {
            (Some(data), None) if self.success => Ok(data),
            (_, Some(err)) => Err(err),
            _ => Err("execution produced no data".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct RawExecutionResult {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(rename = "execution_time_ms", with = "duration_ms")]
    execution_time: Duration,
    cached: bool,
    #[serde(default)]
    metadata: ExecutionMetrics,
}

impl TryFrom<RawExecutionResult> for ExecutionResult {
    type Error = String;

    fn try_from(raw: RawExecutionResult) -> std::result::Result<Self, Self::Error> {
        match (raw.success, raw.data, raw.error) {
            (true, _, Some(_)) => Err("successful result must not carry an error".to_string()),
            // `data: null` reads back as `None`; a success always holds a value.
            (true, data, None) => Ok(Self::success(
                data.unwrap_or(Value::Null),
                raw.cached,
                raw.execution_time,
                raw.metadata,
            )),
            (false, Some(_), _) => Err("failed result must not carry data".to_string()),
            (false, None, None) => Err("failed result must carry an error".to_string()),
            (false, None, Some(error)) => Ok(Self {
                success: false,
                data: None,
                error: Some(error),
                execution_time: raw.execution_time,
                cached: raw.cached,
                metadata: raw.metadata,
            }),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_and_failure_are_exclusive() {
        let ok = ExecutionResult::success(
            json!({"content": "hi"}),
            false,
            Duration::from_millis(12),
            ExecutionMetrics::new().with_tokens(10, 5),
        );
        assert!(ok.is_success());
        assert!(ok.error().is_none());
        assert_eq!(ok.metadata.total_tokens, Some(15));

        let err = ExecutionResult::failure("prompt is required", Duration::from_millis(1));
        assert!(!err.is_success());
        assert!(err.data().is_none());
        assert!(!err.cached);
        assert_eq!(err.into_result(), Err("prompt is required".to_string()));
    }

    #[test]
    fn serializes_execution_time_in_millis() {
        let res = ExecutionResult::success(
            json!(1),
            true,
            Duration::from_millis(1500),
            ExecutionMetrics::default(),
        );
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["execution_time_ms"], json!(1500));
        assert_eq!(v["cached"], json!(true));
        assert!(v.get("error").is_none());
        assert_eq!(v["metadata"], json!({}));

        let back: ExecutionResult = serde_json::from_value(v).unwrap();
        assert_eq!(back, res);
    }

    #[test]
    fn token_total_saturates() {
        let metrics = ExecutionMetrics::new().with_tokens(u64::MAX, 1);
        assert_eq!(metrics.prompt_tokens, Some(u64::MAX));
        assert_eq!(metrics.total_tokens, Some(u64::MAX));
    }

    #[test]
    fn deserializing_rejects_mixed_outcomes() {
        let success_with_error = json!({
            "success": true,
            "data": 1,
            "error": "x",
            "execution_time_ms": 3,
            "cached": false
        });
        assert!(serde_json::from_value::<ExecutionResult>(success_with_error).is_err());

        let failure_with_data = json!({
            "success": false,
            "data": {"content": "hi"},
            "error": "boom",
            "execution_time_ms": 3,
            "cached": false
        });
        assert!(serde_json::from_value::<ExecutionResult>(failure_with_data).is_err());

        let failure_without_error = json!({
            "success": false,
            "execution_time_ms": 3,
            "cached": false
        });
        assert!(serde_json::from_value::<ExecutionResult>(failure_without_error).is_err());

        let failure: ExecutionResult = serde_json::from_value(json!({
            "success": false,
            "error": "boom",
            "execution_time_ms": 3,
            "cached": false
        }))
        .unwrap();
        assert_eq!(failure.error(), Some("boom"));
        assert!(failure.data().is_none());
    }
}
