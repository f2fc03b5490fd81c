//! LLM agent against a mocked chat-completions endpoint.

mod support;

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{flaky_cache, input};
use unicache::agent::{ChatClient, LlmAgent};
use unicache::{CachedExecutor, Error, ExecutorConfig};

const COMPLETION: &str = r#"{
    "id": "chatcmpl-1",
    "model": "gpt-4o-mini-2024-07-18",
    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris."}, "finish_reason": "stop"}],
    "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
}"#;

async fn agent(base_url: &str) -> LlmAgent {
    let (_, cache) = flaky_cache().await;
    let executor = Arc::new(CachedExecutor::new(cache, ExecutorConfig::default()));
    let client = ChatClient::with_timeout(base_url, Some("sk-test".into()), Duration::from_secs(5))
        .unwrap();
    LlmAgent::new("geo", "gpt-4o-mini", Arc::new(client), executor)
}

#[tokio::test]
async fn completion_is_computed_once_then_cached() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "Answer tersely."},
                {"role": "user", "content": "Capital of France?"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(COMPLETION)
        .expect(1)
        .create_async()
        .await;

    let agent = agent(&server.url()).await;
    let q = input(json!({"prompt": "Capital of France?", "system": "Answer tersely."}));

    let first = agent.run(&q).await;
    assert!(first.success, "{:?}", first.error);
    assert!(!first.cached);
    assert_eq!(
        first.data,
        Some(json!({"content": "Paris.", "model": "gpt-4o-mini-2024-07-18"}))
    );
    assert_eq!(first.metadata.prompt_tokens, Some(12));
    assert_eq!(first.metadata.completion_tokens, Some(3));
    assert_eq!(first.metadata.total_tokens, Some(15));
    assert_eq!(first.metadata.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));

    let second = agent.run(&q).await;
    assert!(second.cached);
    assert_eq!(second.data, first.data);

    mock.assert_async().await;
}

#[tokio::test]
async fn invalid_prompt_never_reaches_the_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let agent = agent(&server.url()).await;
    let res = agent.run(&input(json!({"prompt": ""}))).await;
    assert!(!res.success);
    assert_eq!(res.error(), Some("prompt must not be empty"));
    mock.assert_async().await;
}

#[tokio::test]
async fn upstream_rate_limit_is_a_failed_result() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;

    let agent = agent(&server.url()).await;
    let res = agent.run(&input(json!({"prompt": "hello"}))).await;
    assert!(!res.success);
    assert_eq!(
        res.error(),
        Some(
            Error::RateLimited {
                retry_after_ms: Some(7000)
            }
            .to_string()
            .as_str()
        )
    );
}

#[tokio::test]
async fn different_models_do_not_share_entries() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(COMPLETION)
        .expect(2)
        .create_async()
        .await;

    let agent = agent(&server.url()).await;
    let a = agent.run(&input(json!({"prompt": "hi"}))).await;
    let b = agent
        .run(&input(json!({"prompt": "hi", "model": "gpt-4o"})))
        .await;
    assert!(!a.cached && !b.cached);
    mock.assert_async().await;
}

#[tokio::test]
async fn zero_ttl_agent_always_calls_upstream() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(COMPLETION)
        .expect(2)
        .create_async()
        .await;

    let agent = agent(&server.url()).await.with_ttl(Duration::ZERO);
    let q = input(json!({"prompt": "hi"}));
    assert!(!agent.run(&q).await.cached);
    assert!(!agent.run(&q).await.cached);
    mock.assert_async().await;
}
