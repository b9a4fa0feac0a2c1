//! Auto-routing agentic boost and the administrative `/config` / `/state` surface.

use integration_tests::{MockProvider, MockResponse, TestServer, json_response};
use serde_json::json;

#[tokio::test]
async fn agentic_boost_with_threshold_at_negative_infinity_promotes_simple_to_medium() {
    let simple = MockProvider::start(vec![MockResponse::Text("simple tier".to_string())]).await;
    let medium = MockProvider::start(vec![MockResponse::Text("medium tier".to_string())]).await;

    let config = format!(
        r#"
llm:
  providers:
    - name: simple-provider
      type: openai
      base_url: "{}"
      api_key: "test-key"
    - name: medium-provider
      type: openai
      base_url: "{}"
      api_key: "test-key"
  models:
    simple-alias:
      targets:
        - provider: simple-provider
          model: mock-model
    medium-alias:
      targets:
        - provider: medium-provider
          model: mock-model
  auto:
    enabled: true
    agentic_boost_threshold: -1000000000.0
    tier_models:
      heartbeat: ""
      simple: simple-alias
      medium: medium-alias
      complex: ""
      reasoning: ""
"#,
        simple.base_url, medium.base_url,
    );
    let server = TestServer::start(&config).await;

    let response = server
        .post(
            "/v1/chat/completions",
            &json!({"model": "auto", "messages": [{"role": "user", "content": "what is the capital of France?"}]}),
        )
        .await;
    let (status, body) = json_response(response).await;

    assert_eq!(status, 200);
    assert_eq!(body["choices"][0]["message"]["content"], "medium tier");
}

#[tokio::test]
async fn config_endpoint_redacts_api_keys() {
    let upstream = MockProvider::start(vec![MockResponse::Text("ok".to_string())]).await;
    let config = format!(
        "llm:\n  providers:\n    - name: p1\n      type: openai\n      base_url: \"{}\"\n      api_key: \"super-secret\"\n  models:\n    gpt:\n      targets:\n        - provider: p1\n          model: mock-model\n",
        upstream.base_url
    );
    let server = TestServer::start(&config).await;

    let body = json_response(server.get("/config").await).await.1;
    let text = body.to_string();

    assert!(!text.contains("super-secret"));
    assert_eq!(body["providers"][0]["name"], "p1");
    assert_eq!(body["providers"][0]["enabled"], true);
}

#[tokio::test]
async fn state_endpoint_clears_a_cooldown() {
    let failing = MockProvider::start(vec![MockResponse::ServerError]).await;
    let healthy = MockProvider::start(vec![MockResponse::Text("recovered".to_string())]).await;

    let config = format!(
        "llm:\n  providers:\n    - name: a\n      type: openai\n      base_url: \"{}\"\n      api_key: \"k\"\n    - name: b\n      type: openai\n      base_url: \"{}\"\n      api_key: \"k\"\n  models:\n    gpt:\n      selector: priority\n      targets:\n        - provider: a\n          model: mock-model\n        - provider: b\n          model: mock-model\n",
        failing.base_url, healthy.base_url,
    );
    let server = TestServer::start(&config).await;

    server
        .post(
            "/v1/chat/completions",
            &json!({"model": "gpt", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

    let state = json_response(server.get("/state").await).await.1;
    let a = state["providers"].as_array().unwrap().iter().find(|p| p["name"] == "a").unwrap();
    assert_eq!(a["on_cooldown"], true);

    let cleared = json_response(
        server
            .post("/state", &json!({"action": "clear_cooldown", "provider": "a"}))
            .await,
    )
    .await
    .1;
    assert_eq!(cleared["status"], "cleared");

    let state = json_response(server.get("/state").await).await.1;
    let a = state["providers"].as_array().unwrap().iter().find(|p| p["name"] == "a").unwrap();
    assert_eq!(a["on_cooldown"], false);
}
