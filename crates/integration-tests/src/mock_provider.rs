//! A minimal OpenAI-compatible upstream double for exercising the dispatcher, router, and
//! cooldown manager end to end without a real provider.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// One canned reply a [`MockProvider`] serves, popped in FIFO order. The last entry is reused
/// once the queue runs dry, so a test only needs to describe the interesting prefix.
#[derive(Clone)]
pub enum MockResponse {
    Text(String),
    ToolCall { name: String, arguments: Value },
    RateLimited { retry_after_secs: Option<u64> },
    ServerError,
    /// Streamed as a sequence of content deltas followed by a `stop` finish chunk.
    StreamText(Vec<String>),
}

struct Shared {
    queue: Mutex<VecDeque<MockResponse>>,
    requests: AtomicUsize,
}

/// A running mock upstream. Dropping this stops accepting new connections by aborting the
/// listener task; in-flight responses already sent are unaffected.
pub struct MockProvider {
    pub base_url: String,
    shared: Arc<Shared>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockProvider {
    /// Start a mock server that replies with `responses` in order, repeating the last one.
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(responses.into()),
            requests: AtomicUsize::new(0),
        });

        let app = axum::Router::new()
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock provider");
        let address = listener.local_addr().expect("local_addr");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{address}/v1/"),
            shared,
            _handle: handle,
        }
    }

    pub fn request_count(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }
}

async fn handle_chat(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.requests.fetch_add(1, Ordering::SeqCst);

    let response = {
        let mut queue = shared.queue.lock().await;
        match queue.len() {
            0 => MockResponse::Text("ok".to_string()),
            1 => queue.front().cloned().expect("checked len"),
            _ => queue.pop_front().expect("checked len"),
        }
    };

    let streaming = body["stream"].as_bool().unwrap_or(false);
    match (response, streaming) {
        (MockResponse::RateLimited { retry_after_secs }, _) => {
            let mut resp = StatusCode::TOO_MANY_REQUESTS.into_response();
            if let Some(secs) = retry_after_secs {
                resp.headers_mut()
                    .insert("retry-after", secs.to_string().parse().expect("digits are valid header value"));
            }
            resp
        }
        (MockResponse::ServerError, _) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        (MockResponse::Text(text), false) => Json(non_streaming_text(&text)).into_response(),
        (MockResponse::ToolCall { name, arguments }, false) => Json(non_streaming_tool_call(&name, &arguments)).into_response(),
        (MockResponse::Text(text), true) => sse_body(stream_text_chunks(&[text])),
        (MockResponse::StreamText(parts), true) => sse_body(stream_text_chunks(&parts)),
        (MockResponse::StreamText(parts), false) => Json(non_streaming_text(&parts.join(""))).into_response(),
        (MockResponse::ToolCall { name, arguments }, true) => sse_body(stream_tool_call_chunks(&name, &arguments)),
    }
}

fn non_streaming_text(text: &str) -> Value {
    json!({
        "id": "mock-completion",
        "model": "mock-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop",
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    })
}

fn non_streaming_tool_call(name: &str, arguments: &Value) -> Value {
    json!({
        "id": "mock-completion",
        "model": "mock-model",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_0",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()},
                }],
            },
            "finish_reason": "tool_calls",
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    })
}

fn stream_text_chunks(parts: &[String]) -> Vec<Value> {
    let mut chunks = vec![json!({"choices": [{"delta": {"role": "assistant"}, "finish_reason": null}]})];
    for part in parts {
        chunks.push(json!({"choices": [{"delta": {"content": part}, "finish_reason": null}]}));
    }
    chunks.push(json!({
        "choices": [{"delta": {}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    }));
    chunks
}

fn stream_tool_call_chunks(name: &str, arguments: &Value) -> Vec<Value> {
    let args = arguments.to_string();
    vec![
        json!({"choices": [{"delta": {"role": "assistant"}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"tool_calls": [{"id": "call_0", "function": {"name": name}}]}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"tool_calls": [{"id": "call_0", "function": {"arguments": args}}]}, "finish_reason": null}]}),
        json!({
            "choices": [{"delta": {}, "finish_reason": "tool_calls"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
        }),
    ]
}

fn sse_body(chunks: Vec<Value>) -> Response {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str("data: ");
        body.push_str(&chunk.to_string());
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");

    Response::builder()
        .header("content-type", "text/event-stream")
        .body(axum::body::Body::from(body))
        .expect("static response builder never fails")
}
