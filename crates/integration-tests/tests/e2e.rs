//! End-to-end tests driving the `router` facade against mock upstream
//! providers, covering the happy path plus the request-shape edge cases
//! from spec.md §8.

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use router::Router;
use router_config::{LoadBalancingPolicy, ProtocolFamily};

#[tokio::test]
async fn chat_routes_to_the_only_configured_target() {
    let mock = MockLlm::start_with_response("primary response").await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({
        "model": "mock-model-1",
        "messages": [{"role": "user", "content": "Hello"}],
    });

    let response = router.schedule(body, "vm1", ProtocolFamily::Openai).await.unwrap();

    assert_eq!(response["choices"][0]["message"]["content"], "primary response");
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn chat_with_tools_returns_tool_calls() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({
        "model": "mock-model-1",
        "messages": [{"role": "user", "content": "What is the weather?"}],
        "tools": [{
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Get current weather",
                "parameters": {"type": "object", "properties": {"location": {"type": "string"}}}
            }
        }]
    });

    let response = router.schedule(body, "vm1", ProtocolFamily::Openai).await.unwrap();
    let choice = &response["choices"][0];

    assert_eq!(choice["finish_reason"], "tool_calls");
    let tool_calls = choice["message"]["tool_calls"].as_array().unwrap();
    assert_eq!(tool_calls[0]["function"]["name"], "get_weather");
}

#[tokio::test]
async fn unknown_virtual_model_fails_with_unknown_model() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({
        "model": "whatever",
        "messages": [{"role": "user", "content": "Hello"}],
    });

    let error = router.schedule(body, "does-not-exist", ProtocolFamily::Openai).await.unwrap_err();
    assert_eq!(error.kind, "unknown_model");
}

#[tokio::test]
async fn empty_messages_fails_with_invalid_request() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({ "model": "mock-model-1", "messages": [] });

    let error = router.schedule(body, "vm1", ProtocolFamily::Openai).await.unwrap_err();
    assert_eq!(error.kind, "invalid_request");
    assert!(mock.request_count() == 0, "invalid requests must never reach the provider");
}

#[tokio::test]
async fn anthropic_source_against_openai_target_is_translated_both_ways() {
    let mock = MockLlm::start_with_response("translated response").await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({
        "model": "mock-model-1",
        "max_tokens": 1024,
        "messages": [{"role": "user", "content": "Hello"}],
    });

    let response = router.schedule(body, "vm1", ProtocolFamily::Anthropic).await.unwrap();

    assert_eq!(response["type"], "message");
    assert_eq!(response["content"][0]["text"], "translated response");
}

#[tokio::test]
async fn priority_policy_prefers_the_lower_priority_target() {
    let low = MockLlm::start_with_response("low priority").await.unwrap();
    let high = MockLlm::start_with_response("high priority").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("low", ProtocolFamily::Openai, &low.base_url())
        .with_provider("high", ProtocolFamily::Openai, &high.base_url())
        .with_virtual_model(
            "vm1",
            vec![
                router_config::Target {
                    id: "t-low".to_owned(),
                    provider_id: "low".to_owned(),
                    model_id: "mock-model-1".to_owned(),
                    weight: 1,
                    priority: 10,
                    status: router_config::TargetStatus::Active,
                },
                router_config::Target {
                    id: "t-high".to_owned(),
                    provider_id: "high".to_owned(),
                    model_id: "mock-model-1".to_owned(),
                    weight: 1,
                    priority: 0,
                    status: router_config::TargetStatus::Active,
                },
            ],
            LoadBalancingPolicy::Priority,
        )
        .build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({ "model": "mock-model-1", "messages": [{"role": "user", "content": "Hello"}] });
    let response = router.schedule(body, "vm1", ProtocolFamily::Openai).await.unwrap();

    assert_eq!(response["choices"][0]["message"]["content"], "high priority");
    assert_eq!(high.request_count(), 1);
    assert_eq!(low.request_count(), 0);
}
