//! The single reqwest client shared by every provider adapter, plus the upstream-error →
//! [`LlmError`] classification that the dispatcher's retry loop depends on.

use std::sync::OnceLock;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::stream::{BoxStream, StreamExt};
use http::StatusCode;
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::provider::WireRequest;

fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builder")
    })
}

fn build(wire: &WireRequest) -> reqwest::RequestBuilder {
    let mut builder = client().post(&wire.url).json(&wire.body);
    for (name, value) in &wire.headers {
        builder = builder.header(name, value);
    }
    builder
}

/// Classify a non-2xx upstream response into the gateway's error taxonomy.
async fn classify_error(status: StatusCode, response: reqwest::Response) -> LlmError {
    let retry_after = response
        .headers()
        .get(http::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::UpstreamRateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::UpstreamAuth(body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => LlmError::UpstreamInvalid(body),
        s if s.is_server_error() => LlmError::UpstreamTransient(format!("{status}: {body}")),
        _ => LlmError::UpstreamTransient(format!("{status}: {body}")),
    }
}

/// Send a non-streaming request and return the parsed JSON body.
pub async fn send(wire: WireRequest) -> Result<Value> {
    let response = build(&wire)
        .send()
        .await
        .map_err(|err| LlmError::UpstreamTransient(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(classify_error(status, response).await);
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| LlmError::UpstreamInvalid(format!("malformed JSON body: {err}")))
}

/// Send a streaming request and return a stream of parsed SSE data payloads.
pub async fn send_stream(wire: WireRequest) -> Result<BoxStream<'static, Value>> {
    let response = build(&wire)
        .send()
        .await
        .map_err(|err| LlmError::UpstreamTransient(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(classify_error(status, response).await);
    }

    let stream = response
        .bytes_stream()
        .eventsource()
        .filter_map(|event| async move {
            let event = event.ok()?;
            if event.data == "[DONE]" {
                return None;
            }
            sonic_rs::from_str::<Value>(&event.data).ok()
        })
        .boxed();

    Ok(stream)
}
