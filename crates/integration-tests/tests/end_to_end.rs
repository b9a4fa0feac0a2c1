//! End-to-end scenarios, mirroring the spec's "end-to-end scenarios" testable properties:
//! a non-streaming success, a dispatcher fallback across two candidates, and a streaming
//! response carrying a single tool call.

use integration_tests::{MockProvider, MockResponse, TestServer, json_response, sse_events};
use serde_json::json;

fn provider_config(name: &str, base_url: &str) -> String {
    format!(
        "  - name: {name}\n    type: openai\n    base_url: \"{base_url}\"\n    api_key: \"test-key\"\n"
    )
}

#[tokio::test]
async fn chat_non_streaming_success() {
    let upstream = MockProvider::start(vec![MockResponse::Text("hello from mock".to_string())]).await;

    let config = format!(
        "llm:\n  providers:\n{}  models:\n    gpt:\n      targets:\n        - provider: p1\n          model: mock-model\n",
        provider_config("p1", &upstream.base_url)
    );
    let server = TestServer::start(&config).await;

    let response = server
        .post(
            "/v1/chat/completions",
            &json!({"model": "gpt", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;
    let (status, body) = json_response(response).await;

    assert_eq!(status, 200);
    assert_eq!(body["choices"][0]["message"]["content"], "hello from mock");
    assert_eq!(body["usage"]["total_tokens"], 15);
}

#[tokio::test]
async fn dispatcher_falls_back_and_places_failed_provider_on_cooldown() {
    let failing = MockProvider::start(vec![MockResponse::RateLimited { retry_after_secs: Some(1) }]).await;
    let healthy = MockProvider::start(vec![MockResponse::Text("from the healthy provider".to_string())]).await;

    let config = format!(
        "llm:\n  providers:\n{}{}  models:\n    gpt:\n      selector: priority\n      targets:\n        - provider: a\n          model: mock-model\n        - provider: b\n          model: mock-model\n",
        provider_config("a", &failing.base_url),
        provider_config("b", &healthy.base_url),
    );
    let server = TestServer::start(&config).await;

    let response = server
        .post(
            "/v1/chat/completions",
            &json!({"model": "gpt", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;
    let (status, body) = json_response(response).await;

    assert_eq!(status, 200);
    assert_eq!(body["choices"][0]["message"]["content"], "from the healthy provider");
    assert_eq!(failing.request_count(), 1);

    let state = json_response(server.get("/state").await).await.1;
    let providers = state["providers"].as_array().unwrap();
    let a = providers.iter().find(|p| p["name"] == "a").unwrap();
    let b = providers.iter().find(|p| p["name"] == "b").unwrap();
    assert_eq!(a["on_cooldown"], true);
    assert_eq!(b["on_cooldown"], false);
}

#[tokio::test]
async fn streaming_chat_with_tool_call_reaches_a_terminal_event() {
    let upstream = MockProvider::start(vec![MockResponse::ToolCall {
        name: "get_weather".to_string(),
        arguments: json!({"city": "Paris"}),
    }])
    .await;

    let config = format!(
        "llm:\n  providers:\n{}  models:\n    gpt:\n      targets:\n        - provider: p1\n          model: mock-model\n",
        provider_config("p1", &upstream.base_url)
    );
    let server = TestServer::start(&config).await;

    let response = server
        .post(
            "/v1/chat/completions",
            &json!({"model": "gpt", "stream": true, "messages": [{"role": "user", "content": "weather?"}]}),
        )
        .await;
    let events = sse_events(response).await;

    assert!(!events.is_empty());
    assert_eq!(events[0]["choices"][0]["delta"]["role"], "assistant");

    let mut arguments = String::new();
    for event in &events {
        if let Some(calls) = event["choices"][0]["delta"]["tool_calls"].as_array() {
            if let Some(call) = calls.first() {
                if let Some(args) = call["function"]["arguments"].as_str() {
                    arguments.push_str(args);
                }
            }
        }
    }
    let parsed: serde_json::Value = serde_json::from_str(&arguments).expect("accumulated tool arguments must be valid JSON");
    assert_eq!(parsed["city"], "Paris");

    let last = events.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "tool_calls");
}
