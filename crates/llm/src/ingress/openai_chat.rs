//! OpenAI Chat Completions ingress.

use serde_json::Value;
use uuid::Uuid;

use super::{parse_data_uri, warn};
use crate::error::{LlmError, Result};
use crate::unified::{
    AssistantPart, ContentPart, Dialect, Message, ResponseFormat, Sampling, Tool, ToolChoice, ToolNameMap, ToolOutput,
    UnifiedRequest, Warnings,
};

pub fn translate(body: &Value, request_id: Uuid) -> Result<(UnifiedRequest, Warnings)> {
    let mut warnings = Warnings::new();
    let model = body["model"]
        .as_str()
        .ok_or_else(|| LlmError::InvalidRequest("missing `model`".into()))?
        .to_string();

    let raw_messages = body["messages"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidRequest("missing `messages`".into()))?;

    let mut tool_names = ToolNameMap::new();
    for raw in raw_messages {
        if raw["role"].as_str() == Some("assistant") {
            if let Some(calls) = raw["tool_calls"].as_array() {
                for call in calls {
                    if let (Some(id), Some(name)) = (call["id"].as_str(), call["function"]["name"].as_str()) {
                        tool_names.insert(id.to_string(), name.to_string());
                    }
                }
            }
        }
    }

    let mut messages = Vec::with_capacity(raw_messages.len());
    for raw in raw_messages {
        messages.push(translate_message(raw, &mut warnings)?);
    }

    let tools = body["tools"]
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| {
                    let f = &t["function"];
                    Some(Tool {
                        name: f["name"].as_str()?.to_string(),
                        description: f["description"].as_str().map(str::to_string),
                        input_schema: f["parameters"].clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let tool_choice = match &body["tool_choice"] {
        Value::String(s) if s == "auto" => ToolChoice::Auto,
        Value::String(s) if s == "none" => ToolChoice::None,
        Value::String(s) if s == "required" => ToolChoice::Required,
        Value::Object(_) => body["tool_choice"]["function"]["name"]
            .as_str()
            .map(|n| ToolChoice::Specific(n.to_string()))
            .unwrap_or(ToolChoice::Auto),
        _ => ToolChoice::Auto,
    };

    let response_format = match body["response_format"]["type"].as_str() {
        Some("json_object") => ResponseFormat::JsonObject,
        Some("json_schema") => ResponseFormat::JsonSchema {
            schema: body["response_format"]["json_schema"]["schema"].clone(),
            name: body["response_format"]["json_schema"]["name"].as_str().map(str::to_string),
            description: body["response_format"]["json_schema"]["description"].as_str().map(str::to_string),
            strict: body["response_format"]["json_schema"]["strict"].as_bool(),
        },
        _ => ResponseFormat::FreeText,
    };

    let sampling = Sampling {
        max_output_tokens: body["max_tokens"]
            .as_u64()
            .or_else(|| body["max_completion_tokens"].as_u64())
            .map(|n| n as u32),
        temperature: body["temperature"].as_f64().map(|n| n as f32),
        top_p: body["top_p"].as_f64().map(|n| n as f32),
        frequency_penalty: body["frequency_penalty"].as_f64().map(|n| n as f32),
        presence_penalty: body["presence_penalty"].as_f64().map(|n| n as f32),
        stop_sequences: match &body["stop"] {
            Value::String(s) => vec![s.clone()],
            Value::Array(arr) => arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => vec![],
        },
        seed: body["seed"].as_i64(),
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
            incoming_dialect: Dialect::OpenaiChat,
            request_id,
        },
        warnings,
    ))
}

fn translate_message(raw: &Value, warnings: &mut Warnings) -> Result<Message> {
    match raw["role"].as_str() {
        Some("system") => Ok(Message::System { content: text_or_parts(&raw["content"]) }),
        Some("developer") => {
            warn(warnings, "`developer` role collapsed into `system`");
            Ok(Message::System { content: text_or_parts(&raw["content"]) })
        }
        Some("user") => Ok(Message::User { content: translate_user_content(&raw["content"]) }),
        Some("assistant") => {
            let mut parts = Vec::new();
            if let Some(text) = raw["content"].as_str() {
                if !text.is_empty() {
                    parts.push(AssistantPart::Text { text: text.to_string() });
                }
            }
            if let Some(calls) = raw["tool_calls"].as_array() {
                for call in calls {
                    let id = call["id"].as_str().unwrap_or_default().to_string();
                    let name = call["function"]["name"].as_str().unwrap_or_default().to_string();
                    let input = match call["function"]["arguments"].as_str() {
                        Some(args) => sonic_rs::from_str(args).unwrap_or_else(|_| {
                            warn(warnings, format!("tool call `{id}` arguments were not valid JSON"));
                            serde_json::json!({"_raw": args})
                        }),
                        None => serde_json::Value::Null,
                    };
                    parts.push(AssistantPart::ToolCall { id, name, input });
                }
            }
            Ok(Message::Assistant { content: parts })
        }
        Some("tool") => {
            let tool_call_id = raw["tool_call_id"].as_str().unwrap_or_default().to_string();
            let text = raw["content"].as_str().unwrap_or_default();
            let output = sonic_rs::from_str::<Value>(text)
                .map(ToolOutput::Json)
                .unwrap_or_else(|_| ToolOutput::Text(text.to_string()));
            Ok(Message::Tool { tool_call_id, output })
        }
        other => Err(LlmError::InvalidRequest(format!("unsupported message role {other:?}"))),
    }
}

fn text_or_parts(value: &Value) -> String {
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
            Some("text") => Some(ContentPart::Text { text: part["text"].as_str().unwrap_or_default().to_string() }),
            Some("image_url") => {
                let url = part["image_url"]["url"].as_str().unwrap_or_default();
                Some(ContentPart::ImageUrl { url: url.to_string() })
            }
            Some("input_audio") => Some(ContentPart::Audio {
                format: part["input_audio"]["format"].as_str().unwrap_or_default().to_string(),
                data: part["input_audio"]["data"].as_str().unwrap_or_default().to_string(),
            }),
            Some("file") => {
                let filename = part["file"]["filename"].as_str().map(str::to_string);
                if let Some(file_data) = part["file"]["file_data"].as_str() {
                    let (media_type, data) = parse_data_uri(file_data)
                        .unwrap_or_else(|| ("application/octet-stream".to_string(), file_data.to_string()));
                    Some(ContentPart::File { media_type, data, filename })
                } else {
                    part["file"]["file_id"]
                        .as_str()
                        .map(|id| ContentPart::File { media_type: "application/octet-stream".to_string(), data: id.to_string(), filename })
                }
            }
            _ => None,
        })
        .collect()
}
