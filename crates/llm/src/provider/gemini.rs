//! Gemini `generateContent`/`streamGenerateContent` wire adapter.

use async_trait::async_trait;
use config::ProviderConfig;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{Value, json};

use super::{Provider, WireRequest};
use crate::error::{LlmError, Result};
use crate::unified::{
    AssistantPart, ContentPart, FinishReason, Message, ResponseFormat, ResponsePart, StreamEvent, ToolOutput,
    UnifiedRequest, UnifiedResponse, Usage,
};

pub struct GeminiProvider;

#[async_trait]
impl Provider for GeminiProvider {
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

        let mut tool_names = crate::unified::ToolNameMap::new();
        for message in &request.messages {
            if let Message::Assistant { content } = message {
                for part in content {
                    if let AssistantPart::ToolCall { id, name, .. } = part {
                        tool_names.insert(id.clone(), name.clone());
                    }
                }
            }
        }

        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| !matches!(m, Message::System { .. }))
            .map(|m| to_wire_content(m, &tool_names))
            .collect();

        let mut body = json!({ "contents": contents });
        let obj = body.as_object_mut().expect("object literal");

        if !system.is_empty() {
            obj.insert(
                "systemInstruction".into(),
                json!({"parts": [{"text": system}]}),
            );
        }

        if !request.tools.is_empty() {
            obj.insert(
                "tools".into(),
                json!([{
                    "functionDeclarations": request.tools.iter().map(|t| json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    })).collect::<Vec<_>>(),
                }]),
            );
        }

        let sampling = &request.sampling;
        let mut generation_config = serde_json::Map::new();
        if let Some(v) = sampling.max_output_tokens {
            generation_config.insert("maxOutputTokens".into(), json!(v));
        }
        if let Some(v) = sampling.temperature {
            generation_config.insert("temperature".into(), json!(v));
        }
        if let Some(v) = sampling.top_p {
            generation_config.insert("topP".into(), json!(v));
        }
        if !sampling.stop_sequences.is_empty() {
            generation_config.insert("stopSequences".into(), json!(sampling.stop_sequences));
        }
        match &request.response_format {
            ResponseFormat::FreeText => {}
            ResponseFormat::JsonObject => {
                generation_config.insert("responseMimeType".into(), json!("application/json"));
            }
            ResponseFormat::JsonSchema { schema, .. } => {
                generation_config.insert("responseMimeType".into(), json!("application/json"));
                generation_config.insert("responseSchema".into(), schema.clone());
            }
        }
        if !generation_config.is_empty() {
            obj.insert("generationConfig".into(), Value::Object(generation_config));
        }

        for param in &provider.strip_parameters {
            if let Some(cfg) = obj.get_mut("generationConfig").and_then(|v| v.as_object_mut()) {
                cfg.remove(param);
            }
        }

        let action = if request.stream { "streamGenerateContent" } else { "generateContent" };
        let sse_param = if request.stream { "&alt=sse" } else { "" };
        let url = format!(
            "{}models/{upstream_model}:{action}?key={}{sse_param}",
            provider.base_url,
            secrecy::ExposeSecret::expose_secret(&provider.api_key)
        );

        let headers = provider.extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        Ok(WireRequest { url, headers, body })
    }

    async fn invoke(&self, wire: WireRequest, _provider: &ProviderConfig) -> Result<UnifiedResponse> {
        let response = crate::http_client::send(wire).await?;
        let candidate = response["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::UpstreamInvalid("missing candidates[0]".into()))?;

        let mut content = Vec::new();
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if let Some(text) = part["text"].as_str() {
                    content.push(ResponsePart::Text { text: text.to_string() });
                } else if let Some(call) = part.get("functionCall") {
                    content.push(ResponsePart::ToolCall {
                        id: call["name"].as_str().unwrap_or_default().to_string(),
                        name: call["name"].as_str().unwrap_or_default().to_string(),
                        input: call["args"].clone(),
                    });
                }
            }
        }

        let finish_reason = match candidate["finishReason"].as_str() {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
            _ if content.iter().any(|p| matches!(p, ResponsePart::ToolCall { .. })) => FinishReason::ToolCalls,
            _ => FinishReason::Other,
        };

        let usage = Usage {
            input_tokens: response["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: response["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0),
            total_tokens: response["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0),
            cached_input_tokens: response["usageMetadata"]["cachedContentTokenCount"].as_u64(),
            reasoning_tokens: response["usageMetadata"]["thoughtsTokenCount"].as_u64(),
        };

        Ok(UnifiedResponse {
            finish_reason,
            content,
            usage,
            provider_id: String::new(),
            provider_model: response["modelVersion"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn invoke_stream(&self, wire: WireRequest, _provider: &ProviderConfig) -> Result<BoxStream<'static, StreamEvent>> {
        let events = crate::http_client::send_stream(wire).await?;
        Ok(crate::provider::block_tracking::track(events, parse_chunk).boxed())
    }
}

/// Gemini's stream repeats whichever parts changed in the latest candidate; like OpenAI it
/// marks no block boundaries of its own, so block bracketing is synthesized by the tracker.
fn parse_chunk(value: &Value) -> crate::provider::block_tracking::RawEvent {
    use crate::provider::block_tracking::RawEvent;

    let Some(candidate) = value["candidates"].as_array().and_then(|c| c.first()) else {
        return RawEvent::None;
    };

    if let Some(reason) = candidate["finishReason"].as_str() {
        let finish_reason = match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };
        let usage = Usage {
            input_tokens: value["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: value["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0),
            total_tokens: value["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0),
            cached_input_tokens: None,
            reasoning_tokens: value["usageMetadata"]["thoughtsTokenCount"].as_u64(),
        };
        return RawEvent::Finish { finish_reason, usage: Some(usage) };
    }

    let Some(part) = candidate["content"]["parts"].as_array().and_then(|p| p.first()) else {
        return RawEvent::None;
    };
    if let Some(text) = part["text"].as_str() {
        if part["thought"].as_bool().unwrap_or(false) {
            return RawEvent::ReasoningDelta { id: "0".to_string(), text: text.to_string() };
        }
        return RawEvent::TextDelta { id: "0".to_string(), text: text.to_string() };
    }
    if let Some(call) = part.get("functionCall") {
        let name = call["name"].as_str().unwrap_or_default().to_string();
        return RawEvent::ToolComplete {
            id: name.clone(),
            name,
            args_json: call["args"].to_string(),
        };
    }
    RawEvent::None
}

fn to_wire_content(message: &Message, tool_names: &crate::unified::ToolNameMap) -> Value {
    match message {
        Message::System { .. } => unreachable!("system messages are filtered before this point"),
        Message::User { content } => json!({
            "role": "user",
            "parts": content.iter().map(user_part_to_wire).collect::<Vec<_>>(),
        }),
        Message::Assistant { content } => json!({
            "role": "model",
            "parts": content.iter().map(assistant_part_to_wire).collect::<Vec<_>>(),
        }),
        Message::Tool { tool_call_id, output } => {
            let response = match output {
                ToolOutput::Text(text) => json!({"result": text}),
                ToolOutput::Json(value) => value.clone(),
            };
            let name = tool_names.get(tool_call_id).cloned().unwrap_or_else(|| tool_call_id.clone());
            json!({
                "role": "user",
                "parts": [{"functionResponse": {"name": name, "response": response}}],
            })
        }
    }
}

fn assistant_part_to_wire(part: &AssistantPart) -> Value {
    match part {
        AssistantPart::Text { text } => json!({"text": text}),
        AssistantPart::ToolCall { name, input, .. } => json!({"functionCall": {"name": name, "args": input}}),
    }
}

fn user_part_to_wire(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"text": text}),
        ContentPart::ImageUrl { url } => json!({"fileData": {"fileUri": url}}),
        ContentPart::File { media_type, data, .. } => json!({"inlineData": {"mimeType": media_type, "data": data}}),
        ContentPart::Audio { format, data } => json!({"inlineData": {"mimeType": format, "data": data}}),
    }
}
