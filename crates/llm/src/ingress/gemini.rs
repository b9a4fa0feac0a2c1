//! Gemini `generateContent`/`streamGenerateContent` ingress.
//!
//! Unlike the other three dialects, the model name and the streaming flag arrive via the URL
//! path, not the body, so [`translate`] takes them as separate parameters.

use serde_json::Value;
use uuid::Uuid;

use super::warn;
use crate::error::{LlmError, Result};
use crate::unified::{
    AssistantPart, ContentPart, Dialect, Message, ResponseFormat, Sampling, Tool, ToolChoice, ToolOutput, UnifiedRequest,
    Warnings,
};

pub fn translate(body: &Value, model: &str, stream: bool, request_id: Uuid) -> Result<(UnifiedRequest, Warnings)> {
    let mut warnings = Warnings::new();

    let mut messages = Vec::new();
    if let Some(text) = body["systemInstruction"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
    {
        messages.push(Message::System { content: text.to_string() });
    }

    let raw_contents = body["contents"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidRequest("missing `contents`".into()))?;

    for raw in raw_contents {
        messages.push(translate_content(raw, &mut warnings)?);
    }

    let tools = body["tools"]
        .as_array()
        .and_then(|tools| tools.first())
        .and_then(|t| t["functionDeclarations"].as_array())
        .map(|decls| {
            decls
                .iter()
                .filter_map(|d| {
                    Some(Tool {
                        name: d["name"].as_str()?.to_string(),
                        description: d["description"].as_str().map(str::to_string),
                        input_schema: d["parameters"].clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let response_format = match body["generationConfig"]["responseMimeType"].as_str() {
        Some("application/json") => {
            if body["generationConfig"]["responseSchema"].is_null() {
                ResponseFormat::JsonObject
            } else {
                ResponseFormat::JsonSchema {
                    schema: body["generationConfig"]["responseSchema"].clone(),
                    name: None,
                    description: None,
                    strict: None,
                }
            }
        }
        _ => ResponseFormat::FreeText,
    };

    let gc = &body["generationConfig"];
    let sampling = Sampling {
        max_output_tokens: gc["maxOutputTokens"].as_u64().map(|n| n as u32),
        temperature: gc["temperature"].as_f64().map(|n| n as f32),
        top_p: gc["topP"].as_f64().map(|n| n as f32),
        frequency_penalty: None,
        presence_penalty: None,
        stop_sequences: gc["stopSequences"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        seed: None,
    };

    if !tools.is_empty() {
        warn(&mut warnings, "Gemini tool_choice/function-calling mode is not yet surfaced; defaulting to auto");
    }

    Ok((
        UnifiedRequest {
            model: model.to_string(),
            messages,
            tools,
            tool_choice: ToolChoice::Auto,
            response_format,
            sampling,
            stream,
            incoming_dialect: Dialect::Gemini,
            request_id,
        },
        warnings,
    ))
}

fn translate_content(raw: &Value, warnings: &mut Warnings) -> Result<Message> {
    let role = raw["role"].as_str().unwrap_or("user");
    let parts = raw["parts"].as_array().ok_or_else(|| LlmError::InvalidRequest("content missing `parts`".into()))?;

    match role {
        "model" => {
            let assistant_parts = parts
                .iter()
                .filter_map(|part| {
                    if let Some(text) = part["text"].as_str() {
                        Some(AssistantPart::Text { text: text.to_string() })
                    } else if let Some(call) = part.get("functionCall") {
                        Some(AssistantPart::ToolCall {
                            id: call["name"].as_str().unwrap_or_default().to_string(),
                            name: call["name"].as_str().unwrap_or_default().to_string(),
                            input: call["args"].clone(),
                        })
                    } else {
                        None
                    }
                })
                .collect();
            Ok(Message::Assistant { content: assistant_parts })
        }
        _ => {
            if let Some(response) = parts.iter().find_map(|p| p.get("functionResponse")) {
                let tool_call_id = response["name"].as_str().unwrap_or_default().to_string();
                return Ok(Message::Tool { tool_call_id, output: ToolOutput::Json(response["response"].clone()) });
            }
            let content_parts = parts.iter().map(|part| translate_user_part(part, warnings)).collect();
            Ok(Message::User { content: content_parts })
        }
    }
}

fn translate_user_part(part: &Value, warnings: &mut Warnings) -> ContentPart {
    if let Some(text) = part["text"].as_str() {
        return ContentPart::Text { text: text.to_string() };
    }
    if let Some(file_data) = part.get("fileData") {
        return ContentPart::ImageUrl { url: file_data["fileUri"].as_str().unwrap_or_default().to_string() };
    }
    if let Some(inline) = part.get("inlineData") {
        let media_type = inline["mimeType"].as_str().unwrap_or_default().to_string();
        let data = inline["data"].as_str().unwrap_or_default().to_string();
        return if media_type.starts_with("audio/") {
            ContentPart::Audio { format: media_type, data }
        } else {
            ContentPart::File { media_type, data, filename: None }
        };
    }
    warn(warnings, "dropped unsupported Gemini content part");
    ContentPart::Text { text: String::new() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::unified::{AssistantPart, Message};

    #[test]
    fn system_instruction_and_user_turn() {
        let body = json!({
            "systemInstruction": {"parts": [{"text": "be terse"}]},
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
        });
        let (request, warnings) = translate(&body, "gemini-2.0-flash", false, Uuid::nil()).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(request.model, "gemini-2.0-flash");
        assert!(matches!(&request.messages[0], Message::System { content } if content == "be terse"));
        assert!(matches!(&request.messages[1], Message::User { .. }));
    }

    #[test]
    fn model_role_function_call_becomes_tool_call_keyed_by_name() {
        let body = json!({
            "contents": [
                {"role": "user", "parts": [{"text": "weather in Paris?"}]},
                {"role": "model", "parts": [{"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}]},
            ],
        });
        let (request, _) = translate(&body, "gemini-2.0-flash", false, Uuid::nil()).unwrap();

        let Message::Assistant { content } = &request.messages[1] else {
            panic!("expected assistant message");
        };
        assert!(matches!(&content[0], AssistantPart::ToolCall { id, name, .. } if id == "get_weather" && name == "get_weather"));
    }

    #[test]
    fn function_response_becomes_tool_message() {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"functionResponse": {"name": "get_weather", "response": {"tempC": 18}}}],
            }],
        });
        let (request, _) = translate(&body, "gemini-2.0-flash", false, Uuid::nil()).unwrap();

        assert!(matches!(&request.messages[0], Message::Tool { tool_call_id, .. } if tool_call_id == "get_weather"));
    }

    #[test]
    fn missing_contents_is_an_invalid_request() {
        let body = json!({});
        assert!(translate(&body, "gemini-2.0-flash", false, Uuid::nil()).is_err());
    }
}
