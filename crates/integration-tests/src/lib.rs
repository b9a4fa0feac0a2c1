//! Shared test harness: spins up a real Plexus server (the actual `llm::app` router bound to a
//! loopback port) plus mock upstream providers, for black-box end-to-end tests.

pub mod mock_provider;

pub use mock_provider::{MockProvider, MockResponse};

use std::net::SocketAddr;

use config::Config;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A running Plexus gateway under test.
pub struct TestServer {
    pub client: reqwest::Client,
    pub address: SocketAddr,
    pub state: llm::AppState,
    shutdown: CancellationToken,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Parse `config_yaml`, validate it the way the real loader does, and serve it.
    pub async fn start(config_yaml: &str) -> Self {
        let config: Config = serde_yaml::from_str(config_yaml).expect("test config must parse");
        config.validate().expect("test config must validate");

        let state = llm::AppState::new(config);
        let app = llm::app(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let address = listener.local_addr().expect("local_addr");

        let shutdown = CancellationToken::new();
        let shutdown_for_task = shutdown.clone();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown_for_task.cancelled().await })
                .await
                .ok();
        });

        Self {
            client: reqwest::Client::new(),
            address,
            state,
            shutdown,
            _handle: handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("request to test server")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("request to test server")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Parse a non-streaming chat-completions style response body into `(status, json)`.
pub async fn json_response(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json().await.expect("response body must be JSON");
    (status, body)
}

/// Collect an SSE response into its parsed `data:` JSON payloads, skipping `[DONE]`.
pub async fn sse_events(response: reqwest::Response) -> Vec<Value> {
    use eventsource_stream::Eventsource;
    use futures_util::StreamExt;

    assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");

    let mut stream = response.bytes_stream().eventsource();
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event.expect("valid SSE framing");
        if event.data.is_empty() || event.data == "[DONE]" {
            continue;
        }
        events.push(serde_json::from_str(&event.data).expect("SSE data must be JSON"));
    }
    events
}
