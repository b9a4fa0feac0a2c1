//! OpenAI Responses API ingress.
//!
//! The Responses API's item-oriented input (ordered items of kind `message`, `reasoning`,
//! `function_call`, `function_call_output`) is flattened into the same flat [`Message`] sequence
//! the other three dialects produce.

use serde_json::Value;
use uuid::Uuid;

use super::{parse_data_uri, warn};
use crate::error::{LlmError, Result};
use crate::unified::{
    AssistantPart, ContentPart, Dialect, Message, ResponseFormat, Sampling, Tool, ToolChoice, ToolOutput, UnifiedRequest,
    Warnings,
};

pub fn translate(body: &Value, request_id: Uuid) -> Result<(UnifiedRequest, Warnings)> {
    let mut warnings = Warnings::new();
    let model = body["model"]
        .as_str()
        .ok_or_else(|| LlmError::InvalidRequest("missing `model`".into()))?
        .to_string();

    let mut messages = Vec::new();
    if let Some(instructions) = body["instructions"].as_str() {
        messages.push(Message::System { content: instructions.to_string() });
    }

    let items = body["input"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidRequest("missing `input`".into()))?;

    // Buffer consecutive assistant parts (message text, reasoning, function_call) so they collapse
    // into a single Assistant message, matching the other dialects' one-turn-per-message shape.
    let mut pending_assistant: Vec<AssistantPart> = Vec::new();
    let flush_assistant = |messages: &mut Vec<Message>, pending: &mut Vec<AssistantPart>| {
        if !pending.is_empty() {
            messages.push(Message::Assistant { content: std::mem::take(pending) });
        }
    };

    for item in items {
        match item["type"].as_str().or_else(|| item["role"].as_str().map(|_| "message")) {
            Some("message") => {
                let role = item["role"].as_str().unwrap_or("user");
                if role == "assistant" {
                    pending_assistant.push(AssistantPart::Text { text: text_content(&item["content"]) });
                } else {
                    flush_assistant(&mut messages, &mut pending_assistant);
                    let role = if role == "developer" {
                        warn(&mut warnings, "`developer` role collapsed into `system`");
                        "system"
                    } else {
                        role
                    };
                    if role == "system" {
                        messages.push(Message::System { content: text_content(&item["content"]) });
                    } else {
                        messages.push(Message::User { content: translate_user_content(&item["content"]) });
                    }
                }
            }
            Some("reasoning") => {
                let text = item["summary"]
                    .as_array()
                    .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join(""))
                    .unwrap_or_default();
                if !text.is_empty() {
                    pending_assistant.push(AssistantPart::Text { text });
                }
            }
            Some("function_call") => {
                let id = item["call_id"].as_str().or_else(|| item["id"].as_str()).unwrap_or_default().to_string();
                let name = item["name"].as_str().unwrap_or_default().to_string();
                let input = match item["arguments"].as_str() {
                    Some(args) => sonic_rs::from_str(args).unwrap_or_else(|_| {
                        warn(&mut warnings, format!("function_call `{id}` arguments were not valid JSON"));
                        serde_json::json!({"_raw": args})
                    }),
                    None => Value::Null,
                };
                pending_assistant.push(AssistantPart::ToolCall { id, name, input });
            }
            Some("function_call_output") => {
                flush_assistant(&mut messages, &mut pending_assistant);
                let tool_call_id = item["call_id"].as_str().unwrap_or_default().to_string();
                let text = item["output"].as_str().unwrap_or_default();
                let output = sonic_rs::from_str::<Value>(text)
                    .map(ToolOutput::Json)
                    .unwrap_or_else(|_| ToolOutput::Text(text.to_string()));
                messages.push(Message::Tool { tool_call_id, output });
            }
            other => {
                warn(&mut warnings, format!("dropped unsupported Responses input item type {other:?}"));
            }
        }
    }
    flush_assistant(&mut messages, &mut pending_assistant);

    let tools = body["tools"]
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| {
                    Some(Tool {
                        name: t["name"].as_str()?.to_string(),
                        description: t["description"].as_str().map(str::to_string),
                        input_schema: t["parameters"].clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let tool_choice = match &body["tool_choice"] {
        Value::String(s) if s == "auto" => ToolChoice::Auto,
        Value::String(s) if s == "none" => ToolChoice::None,
        Value::String(s) if s == "required" => ToolChoice::Required,
        Value::Object(_) => body["tool_choice"]["name"]
            .as_str()
            .map(|n| ToolChoice::Specific(n.to_string()))
            .unwrap_or(ToolChoice::Auto),
        _ => ToolChoice::Auto,
    };

    let response_format = match body["text"]["format"]["type"].as_str() {
        Some("json_object") => ResponseFormat::JsonObject,
        Some("json_schema") => ResponseFormat::JsonSchema {
            schema: body["text"]["format"]["schema"].clone(),
            name: body["text"]["format"]["name"].as_str().map(str::to_string),
            description: None,
            strict: body["text"]["format"]["strict"].as_bool(),
        },
        _ => ResponseFormat::FreeText,
    };

    let sampling = Sampling {
        max_output_tokens: body["max_output_tokens"].as_u64().map(|n| n as u32),
        temperature: body["temperature"].as_f64().map(|n| n as f32),
        top_p: body["top_p"].as_f64().map(|n| n as f32),
        frequency_penalty: None,
        presence_penalty: None,
        stop_sequences: vec![],
        seed: None,
    };

    let stream = body["stream"].as_bool().unwrap_or(false);

    Ok((
        UnifiedRequest {
            model,
            messages,
            tools,
            tool_choice,
            response_format,
            sampling,
            stream,
            incoming_dialect: Dialect::OpenaiResponses,
            request_id,
        },
        warnings,
    ))
}

fn text_content(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    value
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn translate_user_content(value: &Value) -> Vec<ContentPart> {
    if let Some(s) = value.as_str() {
        return vec![ContentPart::Text { text: s.to_string() }];
    }
    let Some(parts) = value.as_array() else { return vec![] };

    parts
        .iter()
        .filter_map(|part| match part["type"].as_str() {
            Some("input_text") => Some(ContentPart::Text { text: part["text"].as_str().unwrap_or_default().to_string() }),
            Some("input_image") => {
                let url = part["image_url"].as_str().unwrap_or_default();
                Some(ContentPart::ImageUrl { url: url.to_string() })
            }
            Some("input_audio") => Some(ContentPart::Audio {
                format: part["format"].as_str().unwrap_or_default().to_string(),
                data: part["data"].as_str().unwrap_or_default().to_string(),
            }),
            Some("input_file") => {
                let filename = part["filename"].as_str().map(str::to_string);
                if let Some(file_data) = part["file_data"].as_str() {
                    let (media_type, data) = parse_data_uri(file_data)
                        .unwrap_or_else(|| ("application/octet-stream".to_string(), file_data.to_string()));
                    Some(ContentPart::File { media_type, data, filename })
                } else {
                    part["file_id"]
                        .as_str()
                        .map(|id| ContentPart::File { media_type: "application/octet-stream".to_string(), data: id.to_string(), filename })
                }
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::unified::AssistantPart;

    #[test]
    fn consecutive_assistant_items_collapse_into_one_message() {
        let body = json!({
            "model": "gpt-4.1",
            "input": [
                {"type": "message", "role": "user", "content": "what's the weather?"},
                {"type": "function_call", "call_id": "call_1", "name": "get_weather", "arguments": "{\"city\":\"Paris\"}"},
                {"type": "reasoning", "summary": [{"text": "checking weather"}]},
            ],
        });
        let (request, warnings) = translate(&body, Uuid::nil()).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(request.messages.len(), 2);
        let Message::Assistant { content } = &request.messages[1] else {
            panic!("expected a single collapsed assistant message");
        };
        assert_eq!(content.len(), 2);
        assert!(matches!(&content[0], AssistantPart::ToolCall { name, .. } if name == "get_weather"));
        assert!(matches!(&content[1], AssistantPart::Text { text } if text == "checking weather"));
    }

    #[test]
    fn function_call_output_flushes_pending_assistant_and_becomes_a_tool_message() {
        let body = json!({
            "model": "gpt-4.1",
            "input": [
                {"type": "function_call", "call_id": "call_1", "name": "get_weather", "arguments": "{}"},
                {"type": "function_call_output", "call_id": "call_1", "output": "{\"tempC\": 18}"},
            ],
        });
        let (request, _) = translate(&body, Uuid::nil()).unwrap();

        assert!(matches!(&request.messages[0], Message::Assistant { .. }));
        assert!(matches!(&request.messages[1], Message::Tool { tool_call_id, .. } if tool_call_id == "call_1"));
    }

    #[test]
    fn instructions_become_a_leading_system_message() {
        let body = json!({
            "model": "gpt-4.1",
            "instructions": "be terse",
            "input": [{"type": "message", "role": "user", "content": "hi"}],
        });
        let (request, _) = translate(&body, Uuid::nil()).unwrap();

        assert!(matches!(&request.messages[0], Message::System { content } if content == "be terse"));
    }

    #[test]
    fn missing_model_is_an_invalid_request() {
        let body = json!({"input": []});
        assert!(translate(&body, Uuid::nil()).is_err());
    }
}
