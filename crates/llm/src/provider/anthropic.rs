//! Anthropic Messages wire adapter.

use async_trait::async_trait;
use config::ProviderConfig;
use futures::stream::{self, BoxStream, StreamExt};
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use super::{Provider, WireRequest};
use crate::error::{LlmError, Result};
use crate::unified::{
    AssistantPart, ContentPart, FinishReason, Message, ResponseFormat, ResponsePart, StreamEvent, ToolChoice,
    ToolOutput, UnifiedRequest, UnifiedResponse, Usage,
};

pub struct AnthropicProvider;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
impl Provider for AnthropicProvider {
    fn build_request(&self, request: &UnifiedRequest, upstream_model: &str, provider: &ProviderConfig) -> Result<WireRequest> {
        let system: String = request
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::System { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| !matches!(m, Message::System { .. }))
            .map(to_wire_message)
            .collect();

        let max_tokens = request.sampling.max_output_tokens.unwrap_or(4096);
        let mut body = json!({
            "model": upstream_model,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": request.stream,
        });
        let obj = body.as_object_mut().expect("object literal");

        if !system.is_empty() {
            obj.insert("system".into(), json!(system));
        }

        if !request.tools.is_empty() {
            obj.insert(
                "tools".into(),
                json!(
                    request
                        .tools
                        .iter()
                        .map(|t| json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.input_schema,
                        }))
                        .collect::<Vec<_>>()
                ),
            );
        }
        match &request.tool_choice {
            ToolChoice::Auto => {}
            ToolChoice::None => {}
            ToolChoice::Required => {
                obj.insert("tool_choice".into(), json!({"type": "any"}));
            }
            ToolChoice::Specific(name) => {
                obj.insert("tool_choice".into(), json!({"type": "tool", "name": name}));
            }
        }

        if matches!(request.response_format, ResponseFormat::JsonObject | ResponseFormat::JsonSchema { .. }) {
            // Anthropic has no native response-format constraint; ingress already folds this
            // into a trailing instruction on the last user message.
        }

        let sampling = &request.sampling;
        if let Some(v) = sampling.temperature {
            obj.insert("temperature".into(), json!(v));
        }
        if let Some(v) = sampling.top_p {
            obj.insert("top_p".into(), json!(v));
        }
        if !sampling.stop_sequences.is_empty() {
            obj.insert("stop_sequences".into(), json!(sampling.stop_sequences));
        }

        for param in &provider.strip_parameters {
            obj.remove(param);
        }

        let headers = vec![
            ("x-api-key".to_string(), provider.api_key.expose_secret().to_string()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ]
        .into_iter()
        .chain(provider.extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect();

        Ok(WireRequest {
            url: format!("{}messages", provider.base_url),
            headers,
            body,
        })
    }

    async fn invoke(&self, wire: WireRequest, _provider: &ProviderConfig) -> Result<UnifiedResponse> {
        let response = crate::http_client::send(wire).await?;
        let blocks = response["content"]
            .as_array()
            .ok_or_else(|| LlmError::UpstreamInvalid("missing content".into()))?;

        let mut content = Vec::new();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => content.push(ResponsePart::Text {
                    text: block["text"].as_str().unwrap_or_default().to_string(),
                }),
                Some("tool_use") => content.push(ResponsePart::ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    input: block["input"].clone(),
                }),
                _ => {}
            }
        }

        let finish_reason = match response["stop_reason"].as_str() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            _ => FinishReason::Other,
        };

        let usage = Usage {
            input_tokens: response["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: response["usage"]["output_tokens"].as_u64().unwrap_or(0),
            total_tokens: response["usage"]["input_tokens"].as_u64().unwrap_or(0)
                + response["usage"]["output_tokens"].as_u64().unwrap_or(0),
            cached_input_tokens: response["usage"]["cache_read_input_tokens"].as_u64(),
            reasoning_tokens: None,
        };

        Ok(UnifiedResponse {
            finish_reason,
            content,
            usage,
            provider_id: String::new(),
            provider_model: response["model"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn invoke_stream(&self, wire: WireRequest, _provider: &ProviderConfig) -> Result<BoxStream<'static, StreamEvent>> {
        let events = crate::http_client::send_stream(wire).await?;
        let indexed_ids = std::sync::Arc::new(std::sync::Mutex::new(std::collections::HashMap::<u64, String>::new()));
        Ok(events.flat_map(move |value| stream::iter(parse_event(&value, &indexed_ids))).boxed())
    }
}

/// Anthropic's SSE already brackets content blocks explicitly (`content_block_start` /
/// `_delta` / `_stop`, keyed by a numeric `index`); this only needs to remember which unified
/// block id was assigned to each index so deltas and the matching stop can reuse it.
fn parse_event(value: &Value, indexed_ids: &std::sync::Arc<std::sync::Mutex<std::collections::HashMap<u64, String>>>) -> Vec<StreamEvent> {
    let mut ids = indexed_ids.lock().expect("lock poisoned");
    match value["type"].as_str() {
        Some("content_block_start") => {
            let index = value["index"].as_u64().unwrap_or(0);
            let block = &value["content_block"];
            match block["type"].as_str() {
                Some("text") => {
                    let id = format!("text-{index}");
                    ids.insert(index, id.clone());
                    vec![StreamEvent::TextStart { id }]
                }
                Some("thinking") => {
                    let id = format!("reasoning-{index}");
                    ids.insert(index, id.clone());
                    vec![StreamEvent::ReasoningStart { id }]
                }
                Some("tool_use") => {
                    let id = block["id"].as_str().unwrap_or_default().to_string();
                    let name = block["name"].as_str().unwrap_or_default().to_string();
                    ids.insert(index, id.clone());
                    vec![StreamEvent::ToolInputStart { id, name }]
                }
                _ => vec![],
            }
        }
        Some("content_block_delta") => {
            let index = value["index"].as_u64().unwrap_or(0);
            let Some(id) = ids.get(&index).cloned() else { return vec![] };
            let delta = &value["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => vec![StreamEvent::TextDelta {
                    id,
                    text: delta["text"].as_str().unwrap_or_default().to_string(),
                }],
                Some("thinking_delta") => vec![StreamEvent::ReasoningDelta {
                    id,
                    text: delta["thinking"].as_str().unwrap_or_default().to_string(),
                }],
                Some("input_json_delta") => vec![StreamEvent::ToolInputDelta {
                    id,
                    delta: delta["partial_json"].as_str().unwrap_or_default().to_string(),
                }],
                _ => vec![],
            }
        }
        Some("content_block_stop") => {
            let index = value["index"].as_u64().unwrap_or(0);
            let Some(id) = ids.remove(&index) else { return vec![] };
            if id.starts_with("text-") {
                vec![StreamEvent::TextEnd { id }]
            } else if id.starts_with("reasoning-") {
                vec![StreamEvent::ReasoningEnd { id }]
            } else {
                vec![StreamEvent::ToolInputEnd { id }]
            }
        }
        Some("message_delta") => {
            let finish_reason = match value["delta"]["stop_reason"].as_str() {
                Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
                Some("max_tokens") => FinishReason::Length,
                Some("tool_use") => FinishReason::ToolCalls,
                _ => return vec![],
            };
            let usage = Usage {
                input_tokens: 0,
                output_tokens: value["usage"]["output_tokens"].as_u64().unwrap_or(0),
                total_tokens: value["usage"]["output_tokens"].as_u64().unwrap_or(0),
                cached_input_tokens: None,
                reasoning_tokens: None,
            };
            vec![StreamEvent::Finish { finish_reason, usage: Some(usage) }]
        }
        _ => vec![],
    }
}

fn to_wire_message(message: &Message) -> Value {
    match message {
        Message::System { .. } => unreachable!("system messages are filtered before this point"),
        Message::User { content } => json!({
            "role": "user",
            "content": content.iter().map(user_part_to_wire).collect::<Vec<_>>(),
        }),
        Message::Assistant { content } => json!({
            "role": "assistant",
            "content": content.iter().map(assistant_part_to_wire).collect::<Vec<_>>(),
        }),
        Message::Tool { tool_call_id, output } => {
            let content = match output {
                ToolOutput::Text(text) => json!(text),
                ToolOutput::Json(value) => json!(value.to_string()),
            };
            json!({
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": tool_call_id, "content": content}],
            })
        }
    }
}

fn assistant_part_to_wire(part: &AssistantPart) -> Value {
    match part {
        AssistantPart::Text { text } => json!({"type": "text", "text": text}),
        AssistantPart::ToolCall { id, name, input } => json!({
            "type": "tool_use", "id": id, "name": name, "input": input,
        }),
    }
}

fn user_part_to_wire(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"type": "text", "text": text}),
        ContentPart::ImageUrl { url } => json!({"type": "image", "source": {"type": "url", "url": url}}),
        ContentPart::File { media_type, data, .. } => json!({
            "type": "document",
            "source": {"type": "base64", "media_type": media_type, "data": data},
        }),
        ContentPart::Audio { .. } => json!({"type": "text", "text": "[unsupported audio input]"}),
    }
}
