//! OpenAI Responses streaming transducer. Named-event SSE framing.

use std::collections::HashMap;

use serde_json::json;

use super::SseFrame;
use crate::unified::{StreamEvent, Usage};

#[derive(Clone, Copy, PartialEq, Eq)]
enum ItemType {
    Text,
    Reasoning,
    ToolCall,
}

struct Item {
    kind: ItemType,
    output_index: usize,
    item_id: String,
    name: Option<String>,
    accumulated: String,
}

pub struct OpenaiResponsesTransducer {
    response_id: String,
    created_at: i64,
    model: String,
    next_output_index: usize,
    items: HashMap<String, Item>,
    sent_created: bool,
}

impl OpenaiResponsesTransducer {
    pub fn new(response_id: String, created_at: i64, model: String) -> Self {
        Self {
            response_id,
            created_at,
            model,
            next_output_index: 0,
            items: HashMap::new(),
            sent_created: false,
        }
    }

    fn maybe_created(&mut self, frames: &mut Vec<SseFrame>) {
        if !self.sent_created {
            frames.push(SseFrame::named(
                "response.created",
                json!({
                    "response": {
                        "id": self.response_id,
                        "object": "response",
                        "created_at": self.created_at,
                        "model": self.model,
                        "status": "in_progress",
                    }
                }),
            ));
            self.sent_created = true;
        }
    }

    fn start_item(&mut self, id: &str, kind: ItemType, name: Option<String>) -> (usize, String) {
        let output_index = self.next_output_index;
        self.next_output_index += 1;
        let item_id = format!("item-{output_index}");
        self.items.insert(
            id.to_string(),
            Item { kind, output_index, item_id: item_id.clone(), name, accumulated: String::new() },
        );
        (output_index, item_id)
    }

    fn item_json(item: &Item) -> serde_json::Value {
        match item.kind {
            ItemType::Text => json!({
                "type": "message", "id": item.item_id, "role": "assistant",
                "content": [{"type": "output_text", "text": item.accumulated}],
            }),
            ItemType::Reasoning => json!({
                "type": "reasoning", "id": item.item_id,
                "summary": [{"type": "summary_text", "text": item.accumulated}],
            }),
            ItemType::ToolCall => json!({
                "type": "function_call", "id": item.item_id,
                "call_id": item.item_id, "name": item.name, "arguments": item.accumulated,
            }),
        }
    }

    pub fn push(&mut self, event: StreamEvent) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.maybe_created(&mut frames);

        match event {
            StreamEvent::TextStart { id } => {
                let (output_index, item_id) = self.start_item(&id, ItemType::Text, None);
                frames.push(SseFrame::named(
                    "response.output_item.added",
                    json!({"output_index": output_index, "item": {"type": "message", "id": item_id}}),
                ));
            }
            StreamEvent::ReasoningStart { id } => {
                let (output_index, item_id) = self.start_item(&id, ItemType::Reasoning, None);
                frames.push(SseFrame::named(
                    "response.output_item.added",
                    json!({"output_index": output_index, "item": {"type": "reasoning", "id": item_id}}),
                ));
            }
            StreamEvent::ToolInputStart { id, name } => {
                let (output_index, item_id) = self.start_item(&id, ItemType::ToolCall, Some(name.clone()));
                frames.push(SseFrame::named(
                    "response.output_item.added",
                    json!({"output_index": output_index, "item": {"type": "function_call", "id": item_id, "name": name}}),
                ));
            }
            StreamEvent::TextDelta { id, text } => {
                if let Some(item) = self.items.get_mut(&id) {
                    item.accumulated.push_str(&text);
                    frames.push(SseFrame::named(
                        "response.output_text.delta",
                        json!({"item_id": item.item_id, "delta": text}),
                    ));
                }
            }
            StreamEvent::ReasoningDelta { id, text } => {
                if let Some(item) = self.items.get_mut(&id) {
                    item.accumulated.push_str(&text);
                    frames.push(SseFrame::named(
                        "response.reasoning_summary_text.delta",
                        json!({"item_id": item.item_id, "delta": text}),
                    ));
                }
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                if let Some(item) = self.items.get_mut(&id) {
                    item.accumulated.push_str(&delta);
                    frames.push(SseFrame::named(
                        "response.function_call_arguments.delta",
                        json!({"item_id": item.item_id, "delta": delta}),
                    ));
                }
            }
            StreamEvent::TextEnd { id } | StreamEvent::ReasoningEnd { id } | StreamEvent::ToolInputEnd { id } => {
                if let Some(item) = self.items.get(&id) {
                    frames.push(SseFrame::named(
                        "response.output_item.done",
                        json!({"output_index": item.output_index, "item": Self::item_json(item)}),
                    ));
                }
            }
            StreamEvent::Finish { usage, .. } => {
                frames.push(SseFrame::named("response.completed", self.completed_payload(usage)));
            }
            StreamEvent::Error { message } => {
                frames.push(SseFrame::named("response.failed", json!({"error": {"message": message}})));
                frames.push(SseFrame::named("response.completed", self.completed_payload(None)));
            }
            StreamEvent::Abort => {
                frames.push(SseFrame::named("response.completed", self.completed_payload(None)));
            }
        }

        frames
    }

    fn completed_payload(&self, usage: Option<Usage>) -> serde_json::Value {
        let usage_json = usage.map(|u| {
            json!({
                "input_tokens": u.input_tokens,
                "output_tokens": u.output_tokens,
                "total_tokens": u.total_tokens,
                "input_tokens_details": {"cached_tokens": u.cached_input_tokens},
                "output_tokens_details": {"reasoning_tokens": u.reasoning_tokens},
            })
        });
        json!({
            "response": {
                "id": self.response_id,
                "object": "response",
                "model": self.model,
                "status": "completed",
                "usage": usage_json,
            }
        })
    }
}
