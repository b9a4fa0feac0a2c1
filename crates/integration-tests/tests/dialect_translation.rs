//! A client speaking the Anthropic Messages dialect routed to an OpenAI-shaped upstream: the
//! round-trip through ingress -> unified model -> egress must come back in Anthropic's own shape.

use integration_tests::{MockProvider, MockResponse, TestServer, json_response};
use serde_json::json;

#[tokio::test]
async fn anthropic_client_against_an_openai_backed_provider() {
    let upstream = MockProvider::start(vec![MockResponse::Text("translated reply".to_string())]).await;

    let config = format!(
        "llm:\n  providers:\n    - name: p1\n      type: openai\n      base_url: \"{}\"\n      api_key: \"test-key\"\n  models:\n    claude-alias:\n      targets:\n        - provider: p1\n          model: mock-model\n",
        upstream.base_url
    );
    let server = TestServer::start(&config).await;

    let response = server
        .post(
            "/v1/messages",
            &json!({
                "model": "claude-alias",
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "hi"}],
            }),
        )
        .await;
    let (status, body) = json_response(response).await;

    assert_eq!(status, 200);
    assert_eq!(body["type"], "message");
    assert_eq!(body["role"], "assistant");
    assert_eq!(body["content"][0]["type"], "text");
    assert_eq!(body["content"][0]["text"], "translated reply");
    assert_eq!(body["stop_reason"], "end_turn");
}
