//! Anthropic Messages streaming transducer. Named-event SSE framing.

use std::collections::HashMap;

use serde_json::json;

use super::SseFrame;
use crate::egress::anthropic_stop_reason;
use crate::unified::StreamEvent;

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Text,
    Thinking,
    ToolUse,
}

struct Block {
    index: usize,
    kind: BlockType,
}

pub struct AnthropicTransducer {
    message_id: String,
    model: String,
    next_index: usize,
    active_blocks: HashMap<String, Block>,
    input_tokens: u64,
    output_tokens: u64,
    sent_message_start: bool,
}

impl AnthropicTransducer {
    pub fn new(message_id: String, model: String, input_tokens: u64) -> Self {
        Self {
            message_id,
            model,
            next_index: 0,
            active_blocks: HashMap::new(),
            input_tokens,
            output_tokens: 0,
            sent_message_start: false,
        }
    }

    fn maybe_message_start(&mut self, frames: &mut Vec<SseFrame>) {
        if !self.sent_message_start {
            frames.push(SseFrame::named(
                "message_start",
                json!({
                    "message": {
                        "id": self.message_id,
                        "type": "message",
                        "role": "assistant",
                        "model": self.model,
                        "content": [],
                        "usage": {"input_tokens": self.input_tokens, "output_tokens": 0},
                    }
                }),
            ));
            self.sent_message_start = true;
        }
    }

    fn start_block(&mut self, id: &str, kind: BlockType, seed: serde_json::Value) -> Vec<SseFrame> {
        let index = self.next_index;
        self.next_index += 1;
        self.active_blocks.insert(id.to_string(), Block { index, kind });
        vec![SseFrame::named(
            "content_block_start",
            json!({"index": index, "content_block": seed}),
        )]
    }

    pub fn push(&mut self, event: StreamEvent) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.maybe_message_start(&mut frames);

        match event {
            StreamEvent::TextStart { id } => {
                frames.extend(self.start_block(&id, BlockType::Text, json!({"type": "text", "text": ""})));
            }
            StreamEvent::ReasoningStart { id } => {
                frames.extend(self.start_block(&id, BlockType::Thinking, json!({"type": "thinking", "thinking": ""})));
            }
            StreamEvent::ToolInputStart { id, name } => {
                frames.extend(self.start_block(
                    &id,
                    BlockType::ToolUse,
                    json!({"type": "tool_use", "id": id, "name": name, "input": {}}),
                ));
            }
            StreamEvent::TextDelta { id, text } => {
                if let Some(block) = self.active_blocks.get(&id) {
                    frames.push(SseFrame::named(
                        "content_block_delta",
                        json!({"index": block.index, "delta": {"type": "text_delta", "text": text}}),
                    ));
                }
            }
            StreamEvent::ReasoningDelta { id, text } => {
                if let Some(block) = self.active_blocks.get(&id) {
                    frames.push(SseFrame::named(
                        "content_block_delta",
                        json!({"index": block.index, "delta": {"type": "thinking_delta", "thinking": text}}),
                    ));
                }
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                if let Some(block) = self.active_blocks.get(&id) {
                    frames.push(SseFrame::named(
                        "content_block_delta",
                        json!({"index": block.index, "delta": {"type": "input_json_delta", "partial_json": delta}}),
                    ));
                }
            }
            StreamEvent::TextEnd { id } | StreamEvent::ReasoningEnd { id } | StreamEvent::ToolInputEnd { id } => {
                if let Some(block) = self.active_blocks.remove(&id) {
                    frames.push(SseFrame::named("content_block_stop", json!({"index": block.index})));
                }
            }
            StreamEvent::Finish { finish_reason, usage } => {
                if let Some(u) = usage {
                    self.output_tokens = u.output_tokens;
                }
                frames.push(SseFrame::named(
                    "message_delta",
                    json!({
                        "delta": {"stop_reason": anthropic_stop_reason(finish_reason)},
                        "usage": {"output_tokens": self.output_tokens},
                    }),
                ));
                frames.push(SseFrame::named("message_stop", json!({})));
            }
            StreamEvent::Error { .. } | StreamEvent::Abort => {
                frames.push(SseFrame::named(
                    "message_delta",
                    json!({
                        "delta": {"stop_reason": "error"},
                        "usage": {"output_tokens": self.output_tokens},
                    }),
                ));
                frames.push(SseFrame::named("message_stop", json!({})));
            }
        }

        frames
    }
}
