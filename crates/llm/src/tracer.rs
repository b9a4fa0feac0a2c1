//! Per-request debug trace accumulation and fire-and-forget persistence.
//!
//! One [`Tracer`] is created per request and owned by that request's task; it is never shared
//! across requests. Completed traces are handed to a bounded background channel; under
//! backpressure the oldest queued trace is dropped and a warning logged.

use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

const QUEUE_CAPACITY: usize = 1024;
const MAX_STREAM_CHUNKS: usize = 2048;
const MAX_CHUNK_BYTES: usize = 16 * 1024;

/// One recorded provider or client stream chunk, capped in both count and per-chunk size to
/// bound memory for very long-running streams.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedChunk {
    pub seq: u32,
    pub bytes: String,
}

/// The superset trace shape from the source's two overlapping `DebugTrace` variants: which
/// fields are populated depends on whether the request streamed and which leg failed.
#[derive(Debug, Clone, Serialize)]
pub struct DebugTrace {
    pub request_id: Uuid,
    pub created_at: Timestamp,
    pub client_request: Option<Value>,
    pub unified_request: Option<Value>,
    pub provider_request: Option<Value>,
    pub provider_response: Option<Value>,
    pub provider_stream: Vec<RecordedChunk>,
    pub client_stream: Vec<RecordedChunk>,
    pub client_response: Option<Value>,
    pub errors: Vec<String>,
}

impl DebugTrace {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            created_at: Timestamp::now(),
            client_request: None,
            unified_request: None,
            provider_request: None,
            provider_response: None,
            provider_stream: Vec::new(),
            client_stream: Vec::new(),
            client_response: None,
            errors: Vec::new(),
        }
    }
}

/// Accumulates one request's trace; call [`Tracer::finish`] exactly once to hand it off for
/// persistence.
pub struct Tracer {
    trace: DebugTrace,
    sink: TracerSink,
}

impl Tracer {
    pub fn new(request_id: Uuid, sink: TracerSink) -> Self {
        Self { trace: DebugTrace::new(request_id), sink }
    }

    pub fn record_client_request(&mut self, body: Value) {
        self.trace.client_request = Some(body);
    }

    pub fn record_unified_request(&mut self, body: Value) {
        self.trace.unified_request = Some(body);
    }

    pub fn record_provider_request(&mut self, body: Value) {
        self.trace.provider_request = Some(body);
    }

    pub fn record_provider_response(&mut self, body: Value) {
        self.trace.provider_response = Some(body);
    }

    pub fn record_client_response(&mut self, body: Value) {
        self.trace.client_response = Some(body);
    }

    pub fn record_error(&mut self, message: String) {
        self.trace.errors.push(message);
    }

    /// Append a provider-stream chunk, truncating content past `MAX_CHUNK_BYTES` and dropping
    /// chunks once `MAX_STREAM_CHUNKS` has been recorded.
    pub fn record_provider_chunk(&mut self, raw: &str) {
        push_capped(&mut self.trace.provider_stream, raw);
    }

    pub fn record_client_chunk(&mut self, raw: &str) {
        push_capped(&mut self.trace.client_stream, raw);
    }

    /// Hand the accumulated trace to the background writer. Non-blocking, non-fatal.
    pub fn finish(self) {
        self.sink.submit(self.trace);
    }
}

fn push_capped(chunks: &mut Vec<RecordedChunk>, raw: &str) {
    if chunks.len() >= MAX_STREAM_CHUNKS {
        return;
    }
    let truncated: String = raw.chars().take(MAX_CHUNK_BYTES).collect();
    chunks.push(RecordedChunk { seq: chunks.len() as u32, bytes: truncated });
}

/// Handle to the background trace writer. Cheap to clone.
#[derive(Clone)]
pub struct TracerSink {
    sender: mpsc::Sender<DebugTrace>,
}

impl TracerSink {
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(run_writer(receiver));
        Self { sender }
    }

    fn submit(&self, trace: DebugTrace) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.sender.try_send(trace) {
            log::warn!("trace queue full, dropping oldest-pending trace");
        }
    }
}

async fn run_writer(mut receiver: mpsc::Receiver<DebugTrace>) {
    while let Some(trace) = receiver.recv().await {
        match sonic_rs::to_string(&trace) {
            Ok(line) => log::debug!(target: "plexus::trace", "{line}"),
            Err(err) => log::warn!("failed to serialize debug trace: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_cap_stops_growth() {
        let mut chunks = Vec::new();
        for i in 0..(MAX_STREAM_CHUNKS + 10) {
            push_capped(&mut chunks, &format!("chunk-{i}"));
        }
        assert_eq!(chunks.len(), MAX_STREAM_CHUNKS);
    }

    #[test]
    fn chunk_bytes_are_truncated() {
        let mut chunks = Vec::new();
        let huge = "x".repeat(MAX_CHUNK_BYTES * 2);
        push_capped(&mut chunks, &huge);
        assert_eq!(chunks[0].bytes.len(), MAX_CHUNK_BYTES);
    }
}
