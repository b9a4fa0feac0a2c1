//! OpenAI Chat Completions wire adapter. Also backs OpenRouter, which speaks the same dialect.

use async_trait::async_trait;
use config::ProviderConfig;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{Value, json};

use super::{Provider, WireRequest};
use crate::error::{LlmError, Result};
use crate::unified::{
    AssistantPart, ContentPart, FinishReason, Message, ResponseFormat, ResponsePart, StreamEvent, ToolChoice,
    ToolOutput, UnifiedRequest, UnifiedResponse, Usage,
};

pub struct OpenaiProvider;

#[async_trait]
impl Provider for OpenaiProvider {
    fn build_request(&self, request: &UnifiedRequest, upstream_model: &str, provider: &ProviderConfig) -> Result<WireRequest> {
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            messages.push(to_wire_message(message));
        }

        let mut body = json!({
            "model": upstream_model,
            "messages": messages,
            "stream": request.stream,
        });
        let obj = body.as_object_mut().expect("object literal");

        if !request.tools.is_empty() {
            obj.insert(
                "tools".into(),
                json!(
                    request
                        .tools
                        .iter()
                        .map(|t| json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.input_schema,
                            }
                        }))
                        .collect::<Vec<_>>()
                ),
            );
        }
        match &request.tool_choice {
            ToolChoice::Auto => {}
            ToolChoice::None => {
                obj.insert("tool_choice".into(), json!("none"));
            }
            ToolChoice::Required => {
                obj.insert("tool_choice".into(), json!("required"));
            }
            ToolChoice::Specific(name) => {
                obj.insert("tool_choice".into(), json!({"type": "function", "function": {"name": name}}));
            }
        }

        match &request.response_format {
            ResponseFormat::FreeText => {}
            ResponseFormat::JsonObject => {
                obj.insert("response_format".into(), json!({"type": "json_object"}));
            }
            ResponseFormat::JsonSchema { schema, name, strict, .. } => {
                obj.insert(
                    "response_format".into(),
                    json!({
                        "type": "json_schema",
                        "json_schema": {
                            "name": name.clone().unwrap_or_else(|| "response".to_string()),
                            "schema": schema,
                            "strict": strict.unwrap_or(false),
                        }
                    }),
                );
            }
        }

        let sampling = &request.sampling;
        if let Some(v) = sampling.max_output_tokens {
            obj.insert("max_tokens".into(), json!(v));
        }
        if let Some(v) = sampling.temperature {
            obj.insert("temperature".into(), json!(v));
        }
        if let Some(v) = sampling.top_p {
            obj.insert("top_p".into(), json!(v));
        }
        if let Some(v) = sampling.frequency_penalty {
            obj.insert("frequency_penalty".into(), json!(v));
        }
        if let Some(v) = sampling.presence_penalty {
            obj.insert("presence_penalty".into(), json!(v));
        }
        if !sampling.stop_sequences.is_empty() {
            obj.insert("stop".into(), json!(sampling.stop_sequences));
        }
        if let Some(v) = sampling.seed {
            obj.insert("seed".into(), json!(v));
        }

        for param in &provider.strip_parameters {
            obj.remove(param);
        }

        let mut headers = vec![(
            "authorization".to_string(),
            format!("Bearer {}", secrecy::ExposeSecret::expose_secret(&provider.api_key)),
        )];
        headers.extend(provider.extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(WireRequest {
            url: format!("{}chat/completions", provider.base_url),
            headers,
            body,
        })
    }

    async fn invoke(&self, wire: WireRequest, _provider: &ProviderConfig) -> Result<UnifiedResponse> {
        let response = crate::http_client::send(wire).await?;
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::UpstreamInvalid("missing choices[0]".into()))?;

        let mut content = Vec::new();
        let message = &choice["message"];
        if let Some(text) = message["content"].as_str() {
            if !text.is_empty() {
                content.push(ResponsePart::Text { text: text.to_string() });
            }
        }
        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for call in tool_calls {
                let input: Value = call["function"]["arguments"]
                    .as_str()
                    .and_then(|s| sonic_rs::from_str(s).ok())
                    .unwrap_or(Value::Null);
                content.push(ResponsePart::ToolCall {
                    id: call["id"].as_str().unwrap_or_default().to_string(),
                    name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                    input,
                });
            }
        }

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };

        let usage = Usage {
            input_tokens: response["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: response["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: response["usage"]["total_tokens"].as_u64().unwrap_or(0),
            cached_input_tokens: response["usage"]["prompt_tokens_details"]["cached_tokens"].as_u64(),
            reasoning_tokens: response["usage"]["completion_tokens_details"]["reasoning_tokens"].as_u64(),
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
        Ok(crate::provider::block_tracking::track(events, parse_chunk).boxed())
    }
}

/// Translate one upstream Chat Completions SSE chunk into the block-less events the tracker
/// wraps with `*Start`/`*End`. `finish_reason` closes every open block.
fn parse_chunk(value: &Value) -> crate::provider::block_tracking::RawEvent {
    use crate::provider::block_tracking::RawEvent;

    let Some(choice) = value["choices"].as_array().and_then(|c| c.first()) else {
        return RawEvent::None;
    };
    let delta = &choice["delta"];

    if let Some(text) = delta["content"].as_str() {
        if !text.is_empty() {
            return RawEvent::TextDelta { id: "0".to_string(), text: text.to_string() };
        }
    }
    if let Some(calls) = delta["tool_calls"].as_array() {
        if let Some(call) = calls.first() {
            let id = call["id"].as_str().unwrap_or_default().to_string();
            if let Some(name) = call["function"]["name"].as_str() {
                return RawEvent::ToolStart { id, name: name.to_string() };
            }
            if let Some(args) = call["function"]["arguments"].as_str() {
                return RawEvent::ToolDelta { id, delta: args.to_string() };
            }
        }
    }
    if let Some(reason) = choice["finish_reason"].as_str() {
        let finish_reason = match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };
        let usage = value.get("usage").filter(|v| !v.is_null()).map(|_| Usage {
            input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: value["usage"]["total_tokens"].as_u64().unwrap_or(0),
            cached_input_tokens: None,
            reasoning_tokens: None,
        });
        return RawEvent::Finish { finish_reason, usage };
    }
    RawEvent::None
}

fn to_wire_message(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::User { content } => json!({
            "role": "user",
            "content": content.iter().map(user_part_to_wire).collect::<Vec<_>>(),
        }),
        Message::Assistant { content } => {
            let text: String = content
                .iter()
                .filter_map(|p| match p {
                    AssistantPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            let tool_calls: Vec<Value> = content
                .iter()
                .filter_map(|p| match p {
                    AssistantPart::ToolCall { id, name, input } => Some(json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": input.to_string()},
                    })),
                    _ => None,
                })
                .collect();
            let mut obj = serde_json::Map::new();
            obj.insert("role".into(), json!("assistant"));
            if !text.is_empty() {
                obj.insert("content".into(), json!(text));
            }
            if !tool_calls.is_empty() {
                obj.insert("tool_calls".into(), json!(tool_calls));
            }
            Value::Object(obj)
        }
        Message::Tool { tool_call_id, output } => {
            let content = match output {
                ToolOutput::Text(text) => text.clone(),
                ToolOutput::Json(value) => value.to_string(),
            };
            json!({"role": "tool", "tool_call_id": tool_call_id, "content": content})
        }
    }
}

fn user_part_to_wire(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"type": "text", "text": text}),
        ContentPart::ImageUrl { url } => json!({"type": "image_url", "image_url": {"url": url}}),
        ContentPart::File { media_type, data, filename } => json!({
            "type": "file",
            "file": {"file_data": format!("data:{media_type};base64,{data}"), "filename": filename},
        }),
        ContentPart::Audio { format, data } => json!({
            "type": "input_audio",
            "input_audio": {"data": data, "format": format},
        }),
    }
}
