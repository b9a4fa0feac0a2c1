//! Anthropic Messages ingress.

use serde_json::Value;
use uuid::Uuid;

use super::warn;
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
    if let Some(system) = body["system"].as_str() {
        messages.push(Message::System { content: system.to_string() });
    } else if let Some(parts) = body["system"].as_array() {
        let text = parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join("\n\n");
        if !text.is_empty() {
            messages.push(Message::System { content: text });
        }
    }

    let raw_messages = body["messages"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidRequest("missing `messages`".into()))?;

    for raw in raw_messages {
        messages.extend(translate_message(raw, &mut warnings)?);
    }

    let tools = body["tools"]
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| {
                    Some(Tool {
                        name: t["name"].as_str()?.to_string(),
                        description: t["description"].as_str().map(str::to_string),
                        input_schema: t["input_schema"].clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let tool_choice = match body["tool_choice"]["type"].as_str() {
        Some("auto") => ToolChoice::Auto,
        Some("any") => ToolChoice::Required,
        Some("tool") => body["tool_choice"]["name"]
            .as_str()
            .map(|n| ToolChoice::Specific(n.to_string()))
            .unwrap_or(ToolChoice::Auto),
        _ => ToolChoice::Auto,
    };

    let sampling = Sampling {
        max_output_tokens: body["max_tokens"].as_u64().map(|n| n as u32),
        temperature: body["temperature"].as_f64().map(|n| n as f32),
        top_p: body["top_p"].as_f64().map(|n| n as f32),
        frequency_penalty: None,
        presence_penalty: None,
        stop_sequences: body["stop_sequences"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        seed: None,
    };

    let stream = body["stream"].as_bool().unwrap_or(false);

    Ok((
        UnifiedRequest {
            model,
            messages,
            tools,
            tool_choice,
            response_format: ResponseFormat::FreeText,
            sampling,
            stream,
            incoming_dialect: Dialect::AnthropicMessages,
            request_id,
        },
        warnings,
    ))
}

fn translate_message(raw: &Value, warnings: &mut Warnings) -> Result<Vec<Message>> {
    let role = raw["role"].as_str().ok_or_else(|| LlmError::InvalidRequest("message missing `role`".into()))?;

    match (role, &raw["content"]) {
        ("user", Value::String(s)) => Ok(vec![Message::User { content: vec![ContentPart::Text { text: s.clone() }] }]),
        ("user", Value::Array(blocks)) => {
            // Anthropic interleaves tool_result blocks inside user turns; split them out into
            // distinct Tool messages so the unified model keeps its own Tool variant.
            let mut out = Vec::new();
            let mut content_parts = Vec::new();
            for block in blocks {
                match block["type"].as_str() {
                    Some("tool_result") => {
                        if !content_parts.is_empty() {
                            out.push(Message::User { content: std::mem::take(&mut content_parts) });
                        }
                        let tool_call_id = block["tool_use_id"].as_str().unwrap_or_default().to_string();
                        let output = tool_result_output(&block["content"]);
                        out.push(Message::Tool { tool_call_id, output });
                    }
                    _ => content_parts.push(translate_user_block(block, warnings)),
                }
            }
            if !content_parts.is_empty() {
                out.push(Message::User { content: content_parts });
            }
            Ok(out)
        }
        ("assistant", Value::Array(blocks)) => {
            let parts = blocks
                .iter()
                .filter_map(|block| match block["type"].as_str() {
                    Some("text") => Some(AssistantPart::Text { text: block["text"].as_str().unwrap_or_default().to_string() }),
                    Some("tool_use") => Some(AssistantPart::ToolCall {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        input: block["input"].clone(),
                    }),
                    _ => None,
                })
                .collect();
            Ok(vec![Message::Assistant { content: parts }])
        }
        ("assistant", Value::String(s)) => Ok(vec![Message::Assistant { content: vec![AssistantPart::Text { text: s.clone() }] }]),
        (other, _) => Err(LlmError::InvalidRequest(format!("unsupported message role {other}"))),
    }
}

fn tool_result_output(content: &Value) -> ToolOutput {
    match content {
        Value::String(s) => sonic_rs::from_str::<Value>(s).map(ToolOutput::Json).unwrap_or_else(|_| ToolOutput::Text(s.clone())),
        Value::Array(blocks) => {
            let text: String = blocks.iter().filter_map(|b| b["text"].as_str()).collect::<Vec<_>>().join("");
            ToolOutput::Text(text)
        }
        other => ToolOutput::Json(other.clone()),
    }
}

fn translate_user_block(block: &Value, warnings: &mut Warnings) -> ContentPart {
    match block["type"].as_str() {
        Some("text") => ContentPart::Text { text: block["text"].as_str().unwrap_or_default().to_string() },
        Some("image") => match block["source"]["type"].as_str() {
            Some("url") => ContentPart::ImageUrl { url: block["source"]["url"].as_str().unwrap_or_default().to_string() },
            _ => ContentPart::File {
                media_type: block["source"]["media_type"].as_str().unwrap_or_default().to_string(),
                data: block["source"]["data"].as_str().unwrap_or_default().to_string(),
                filename: None,
            },
        },
        Some("document") => ContentPart::File {
            media_type: block["source"]["media_type"].as_str().unwrap_or_default().to_string(),
            data: block["source"]["data"].as_str().unwrap_or_default().to_string(),
            filename: None,
        },
        other => {
            warn(warnings, format!("dropped unsupported content block type {other:?}"));
            ContentPart::Text { text: String::new() }
        }
    }
}
