//! OpenAI Chat Completions streaming transducer. Anonymous-data SSE framing.

use std::collections::HashMap;

use serde_json::json;

use super::SseFrame;
use crate::egress::openai_finish_reason;
use crate::unified::StreamEvent;

struct ToolCallState {
    index: usize,
}

pub struct OpenaiChatTransducer {
    stream_id: String,
    created: i64,
    model: String,
    next_tool_call_index: usize,
    tool_calls: HashMap<String, ToolCallState>,
    sent_role: bool,
}

impl OpenaiChatTransducer {
    pub fn new(stream_id: String, created: i64, model: String) -> Self {
        Self {
            stream_id,
            created,
            model,
            next_tool_call_index: 0,
            tool_calls: HashMap::new(),
            sent_role: false,
        }
    }

    fn base_chunk(&self, delta: serde_json::Value, finish_reason: Option<&str>) -> serde_json::Value {
        json!({
            "id": self.stream_id,
            "object": "chat.completion.chunk",
            "created": self.created,
            "model": self.model,
            "choices": [{
                "index": 0,
                "delta": delta,
                "finish_reason": finish_reason,
            }],
        })
    }

    /// Translate one neutral event into zero or more SSE frames.
    pub fn push(&mut self, event: StreamEvent) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        let maybe_role_frame = |this: &mut Self, frames: &mut Vec<SseFrame>| {
            if !this.sent_role {
                frames.push(SseFrame::anonymous(this.base_chunk(json!({"role": "assistant"}), None)));
                this.sent_role = true;
            }
        };

        match event {
            StreamEvent::TextStart { .. } | StreamEvent::ReasoningStart { .. } => {
                maybe_role_frame(self, &mut frames);
            }
            StreamEvent::TextDelta { text, .. } | StreamEvent::ReasoningDelta { text, .. } => {
                maybe_role_frame(self, &mut frames);
                frames.push(SseFrame::anonymous(self.base_chunk(json!({"content": text}), None)));
            }
            StreamEvent::TextEnd { .. } | StreamEvent::ReasoningEnd { .. } => {}
            StreamEvent::ToolInputStart { id, name } => {
                let index = self.next_tool_call_index;
                self.next_tool_call_index += 1;
                self.tool_calls.insert(id.clone(), ToolCallState { index });
                frames.push(SseFrame::anonymous(self.base_chunk(
                    json!({"tool_calls": [{"index": index, "id": id, "type": "function", "function": {"name": name, "arguments": ""}}]}),
                    None,
                )));
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                if let Some(state) = self.tool_calls.get(&id) {
                    frames.push(SseFrame::anonymous(self.base_chunk(
                        json!({"tool_calls": [{"index": state.index, "function": {"arguments": delta}}]}),
                        None,
                    )));
                }
            }
            StreamEvent::ToolInputEnd { .. } => {}
            StreamEvent::Finish { finish_reason, usage } => {
                let usage_json = usage.map(|u| {
                    json!({
                        "prompt_tokens": u.input_tokens,
                        "completion_tokens": u.output_tokens,
                        "total_tokens": u.total_tokens,
                        "prompt_tokens_details": {"cached_tokens": u.cached_input_tokens},
                        "completion_tokens_details": {"reasoning_tokens": u.reasoning_tokens},
                    })
                });
                let mut chunk = self.base_chunk(json!({}), Some(openai_finish_reason(finish_reason)));
                if let Some(usage_json) = usage_json {
                    chunk["usage"] = usage_json;
                }
                frames.push(SseFrame::anonymous(chunk));
                frames.push(SseFrame::done());
            }
            StreamEvent::Error { .. } | StreamEvent::Abort => {
                frames.push(SseFrame::anonymous(self.base_chunk(json!({}), Some("stop"))));
                frames.push(SseFrame::done());
            }
        }

        frames
    }
}
