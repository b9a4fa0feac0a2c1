//! Gemini `streamGenerateContent` transducer.
//!
//! Unlike the three dialects the source specifies explicitly, Gemini's streaming wire format
//! carries no block-start/stop framing of its own: every chunk repeats a full (partial)
//! `candidates[0].content.parts` array. This mirrors that shape instead of inventing a framing
//! the real API doesn't have.

use serde_json::json;

use super::SseFrame;
use crate::egress::gemini_finish_reason;
use crate::unified::StreamEvent;

pub struct GeminiTransducer {
    model: String,
}

impl GeminiTransducer {
    pub fn new(model: String) -> Self {
        Self { model }
    }

    pub fn push(&mut self, event: StreamEvent) -> Vec<SseFrame> {
        match event {
            StreamEvent::TextDelta { text, .. } => vec![self.chunk(json!({"text": text}), None, None)],
            StreamEvent::ReasoningDelta { text, .. } => vec![self.chunk(json!({"text": text, "thought": true}), None, None)],
            StreamEvent::ToolInputStart { name, .. } => {
                vec![self.chunk(json!({"functionCall": {"name": name, "args": {}}}), None, None)]
            }
            StreamEvent::ToolInputDelta { .. } => vec![],
            StreamEvent::TextStart { .. } | StreamEvent::ReasoningStart { .. } | StreamEvent::ToolInputEnd { .. } => {
                vec![]
            }
            StreamEvent::TextEnd { .. } | StreamEvent::ReasoningEnd { .. } => vec![],
            StreamEvent::Finish { finish_reason, usage } => {
                vec![self.chunk(json!({"text": ""}), Some(gemini_finish_reason(finish_reason)), usage)]
            }
            StreamEvent::Error { .. } | StreamEvent::Abort => vec![self.chunk(json!({"text": ""}), Some("STOP"), None)],
        }
    }

    fn chunk(&self, part: serde_json::Value, finish_reason: Option<&str>, usage: Option<crate::unified::Usage>) -> SseFrame {
        let mut candidate = json!({
            "content": {"role": "model", "parts": [part]},
            "index": 0,
        });
        if let Some(reason) = finish_reason {
            candidate["finishReason"] = json!(reason);
        }
        let mut body = json!({"candidates": [candidate], "modelVersion": self.model});
        if let Some(u) = usage {
            body["usageMetadata"] = json!({
                "promptTokenCount": u.input_tokens,
                "candidatesTokenCount": u.output_tokens,
                "totalTokenCount": u.total_tokens,
            });
        }
        SseFrame::anonymous(body)
    }
}
