//! Per-dialect streaming transducers: stateful, push-style translators from the neutral
//! [`crate::unified::StreamEvent`] sequence to each client dialect's SSE event sequence.

pub mod anthropic;
pub mod gemini;
pub mod openai_chat;
pub mod openai_responses;

use axum::response::sse::Event;
use serde_json::Value;

/// One SSE frame, before byte encoding. `event` is `None` for anonymous-data framing (OpenAI
/// Chat) and `Some(name)` for named-event framing (OpenAI Responses, Anthropic).
pub enum SseFrame {
    Json { event: Option<String>, data: Value },
    /// A literal data payload, bypassing JSON encoding (OpenAI's `data: [DONE]` sentinel).
    Raw(&'static str),
}

impl SseFrame {
    pub fn anonymous(data: Value) -> Self {
        Self::Json { event: None, data }
    }

    pub fn named(event: &str, data: Value) -> Self {
        Self::Json { event: Some(event.to_string()), data }
    }

    pub fn done() -> Self {
        Self::Raw("[DONE]")
    }

    pub fn into_axum_event(self) -> Event {
        match self {
            Self::Json { event: Some(name), data } => {
                let data = sonic_rs::to_string(&data).unwrap_or_else(|_| "{}".to_string());
                Event::default().event(name).data(data)
            }
            Self::Json { event: None, data } => {
                let data = sonic_rs::to_string(&data).unwrap_or_else(|_| "{}".to_string());
                Event::default().data(data)
            }
            Self::Raw(data) => Event::default().data(data),
        }
    }
}
