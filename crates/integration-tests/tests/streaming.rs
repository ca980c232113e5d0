//! Exercises `Router::schedule_streaming` (spec.md §6, §8 scenario 6):
//! content reconstruction, usage, termination, cancellation, and
//! tool-call deltas arriving over the provider's own SSE stream.

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use router::{Router, StreamItem};
use router_config::ProtocolFamily;

fn streaming_body() -> serde_json::Value {
    serde_json::json!({
        "model": "mock-model-1",
        "messages": [{"role": "user", "content": "Hello"}],
        "stream": true,
    })
}

async fn collect_chunks(router: &Router) -> Vec<serde_json::Value> {
    let mut sequence = router.schedule_streaming(streaming_body(), "vm1", ProtocolFamily::Openai).await.unwrap();

    let mut chunks = Vec::new();
    while let Some(item) = sequence.next_chunk().await {
        match item {
            StreamItem::Chunk(value) => chunks.push(value),
            StreamItem::Error(error) => panic!("unexpected stream error: {error:?}"),
        }
    }
    chunks
}

#[tokio::test]
async fn streaming_chunks_have_correct_object_type() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let chunks = collect_chunks(&router).await;
    assert!(!chunks.is_empty());

    for chunk in &chunks {
        assert_eq!(chunk["object"], "chat.completion.chunk");
    }
}

#[tokio::test]
async fn streaming_chunks_reconstruct_content() {
    let mock = MockLlm::start_with_response("Hello from mock LLM").await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let chunks = collect_chunks(&router).await;

    let mut full_content = String::new();
    for chunk in &chunks {
        if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str() {
            full_content.push_str(content);
        }
    }

    assert_eq!(full_content.trim(), "Hello from mock LLM");
}

#[tokio::test]
async fn streaming_includes_a_usage_chunk() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let chunks = collect_chunks(&router).await;

    let has_usage = chunks.iter().any(|chunk| {
        let usage = &chunk["usage"];
        !usage.is_null()
            && usage.get("prompt_tokens").is_some()
            && usage.get("completion_tokens").is_some()
            && usage.get("total_tokens").is_some()
    });

    assert!(has_usage, "stream should include a usage chunk");
}

#[tokio::test]
async fn streaming_terminates_with_a_finish_reason() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let chunks = collect_chunks(&router).await;

    let has_stop = chunks.iter().any(|chunk| chunk["choices"][0]["finish_reason"] == "stop");
    assert!(has_stop, "stream should carry a finish_reason once complete");
}

#[tokio::test]
async fn cancelling_a_stream_yields_a_cancelled_chunk() {
    // Long enough (at 24 chars/synthetic chunk) to overrun the sequence's
    // bounded channel, so the producing task is still blocked on a send
    // when we cancel, guaranteeing it observes cancellation before the
    // sequence would otherwise have completed naturally.
    let long_response = "a".repeat(900);
    let mock = MockLlm::start_with_response(&long_response).await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let mut sequence = router.schedule_streaming(streaming_body(), "vm1", ProtocolFamily::Openai).await.unwrap();

    sequence.next_chunk().await.expect("at least one chunk before cancellation");
    sequence.cancel();

    let mut saw_cancelled = false;
    while let Some(item) = sequence.next_chunk().await {
        if let StreamItem::Chunk(value) = item {
            if value["choices"][0]["finish_reason"] == "cancelled" {
                saw_cancelled = true;
            }
        }
    }

    assert!(saw_cancelled, "cancelling mid-stream should emit a synthetic cancelled chunk");
}

#[tokio::test]
async fn streaming_reconstructs_tool_calls_from_sse_deltas() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).build();
    let router = Router::from_config_snapshot(config).unwrap();

    let body = serde_json::json!({
        "model": "mock-model-1",
        "messages": [{"role": "user", "content": "What is the weather?"}],
        "stream": true,
        "tools": [{
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Get current weather",
                "parameters": {"type": "object", "properties": {"location": {"type": "string"}}}
            }
        }]
    });

    let mut sequence = router.schedule_streaming(body, "vm1", ProtocolFamily::Openai).await.unwrap();

    let mut tool_call_id = None;
    let mut tool_call_name = None;
    let mut arguments = String::new();
    let mut saw_finish = false;

    while let Some(item) = sequence.next_chunk().await {
        let StreamItem::Chunk(chunk) = item else { panic!("unexpected stream error") };
        let Some(delta) = chunk["choices"].get(0).map(|c| &c["delta"]) else { continue };

        if let Some(calls) = delta["tool_calls"].as_array() {
            let call = &calls[0];
            if let Some(id) = call["id"].as_str() {
                tool_call_id = Some(id.to_owned());
            }
            if let Some(name) = call["function"]["name"].as_str() {
                tool_call_name = Some(name.to_owned());
            }
            if let Some(fragment) = call["function"]["arguments"].as_str() {
                arguments.push_str(fragment);
            }
        }
        if chunk["choices"][0]["finish_reason"] == "tool_calls" {
            saw_finish = true;
        }
    }

    assert_eq!(tool_call_id.as_deref(), Some("call_test_123"));
    assert_eq!(tool_call_name.as_deref(), Some("get_weather"));
    assert_eq!(arguments, r#"{"location":"San Francisco"}"#);
    assert!(saw_finish, "stream should terminate with finish_reason tool_calls");
}

#[tokio::test]
async fn streaming_errors_surface_as_a_stream_item() {
    let mock = MockLlm::start_failing(10).await.unwrap();
    let config = ConfigBuilder::new().with_single_openai_target(&mock.base_url()).with_fast_retry().build();
    let router = Router::from_config_snapshot(config).unwrap();

    let mut sequence = router.schedule_streaming(streaming_body(), "vm1", ProtocolFamily::Openai).await.unwrap();

    let mut saw_error = false;
    while let Some(item) = sequence.next_chunk().await {
        if matches!(item, StreamItem::Error(_)) {
            saw_error = true;
        }
    }

    assert!(saw_error, "an unrecovered provider failure must surface as StreamItem::Error");
}
