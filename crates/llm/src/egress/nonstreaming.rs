//! Maps a completed [`UnifiedResponse`] onto each client dialect's non-streaming response body.

use serde_json::{Value, json};

use super::{anthropic_stop_reason, gemini_finish_reason, openai_finish_reason};
use crate::unified::{ResponsePart, UnifiedResponse, Usage};

fn usage_or_null(tokens: Option<u64>) -> Value {
    match tokens {
        Some(n) => json!(n),
        None => Value::Null,
    }
}

pub fn to_openai_chat(response: &UnifiedResponse, request_id: uuid::Uuid) -> Value {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in &response.content {
        match part {
            ResponsePart::Text { text: t } | ResponsePart::ReasoningText { text: t } => text.push_str(t),
            ResponsePart::ToolCall { id, name, input } => tool_calls.push(json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": input.to_string()},
            })),
            ResponsePart::Source { .. } => {}
        }
    }

    let mut message = serde_json::Map::new();
    message.insert("role".into(), json!("assistant"));
    message.insert("content".into(), if text.is_empty() { Value::Null } else { json!(text) });
    if !tool_calls.is_empty() {
        message.insert("tool_calls".into(), json!(tool_calls));
    }

    json!({
        "id": format!("chatcmpl-{request_id}"),
        "object": "chat.completion",
        "model": response.provider_model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": openai_finish_reason(response.finish_reason),
        }],
        "usage": usage_json(response.usage),
    })
}

fn usage_json(usage: Usage) -> Value {
    json!({
        "prompt_tokens": usage.input_tokens,
        "completion_tokens": usage.output_tokens,
        "total_tokens": usage.total_tokens,
        "prompt_tokens_details": {"cached_tokens": usage_or_null(usage.cached_input_tokens)},
        "completion_tokens_details": {"reasoning_tokens": usage_or_null(usage.reasoning_tokens)},
    })
}

pub fn to_openai_responses(response: &UnifiedResponse, request_id: uuid::Uuid) -> Value {
    let mut output = Vec::new();
    for part in &response.content {
        match part {
            ResponsePart::Text { text } => output.push(json!({
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": text}],
            })),
            ResponsePart::ReasoningText { text } => output.push(json!({
                "type": "reasoning",
                "summary": [{"type": "summary_text", "text": text}],
            })),
            ResponsePart::ToolCall { id, name, input } => output.push(json!({
                "type": "function_call",
                "call_id": id,
                "name": name,
                "arguments": input.to_string(),
            })),
            ResponsePart::Source { url, title } => output.push(json!({
                "type": "output_text_annotation",
                "url": url,
                "title": title,
            })),
        }
    }

    json!({
        "id": format!("resp-{request_id}"),
        "object": "response",
        "model": response.provider_model,
        "status": "completed",
        "output": output,
        "usage": {
            "input_tokens": response.usage.input_tokens,
            "output_tokens": response.usage.output_tokens,
            "total_tokens": response.usage.total_tokens,
            "input_tokens_details": {"cached_tokens": usage_or_null(response.usage.cached_input_tokens)},
            "output_tokens_details": {"reasoning_tokens": usage_or_null(response.usage.reasoning_tokens)},
        },
    })
}

pub fn to_anthropic_messages(response: &UnifiedResponse, request_id: uuid::Uuid) -> Value {
    let content: Vec<Value> = response
        .content
        .iter()
        .filter_map(|part| match part {
            ResponsePart::Text { text } => Some(json!({"type": "text", "text": text})),
            ResponsePart::ToolCall { id, name, input } => Some(json!({
                "type": "tool_use", "id": id, "name": name, "input": input,
            })),
            ResponsePart::ReasoningText { .. } | ResponsePart::Source { .. } => None,
        })
        .collect();

    json!({
        "id": format!("msg-{request_id}"),
        "type": "message",
        "role": "assistant",
        "model": response.provider_model,
        "content": content,
        "stop_reason": anthropic_stop_reason(response.finish_reason),
        "usage": {
            "input_tokens": response.usage.input_tokens,
            "output_tokens": response.usage.output_tokens,
            "cache_read_input_tokens": usage_or_null(response.usage.cached_input_tokens),
        },
    })
}

pub fn to_gemini(response: &UnifiedResponse) -> Value {
    let parts: Vec<Value> = response
        .content
        .iter()
        .filter_map(|part| match part {
            ResponsePart::Text { text } => Some(json!({"text": text})),
            ResponsePart::ToolCall { name, input, .. } => Some(json!({"functionCall": {"name": name, "args": input}})),
            ResponsePart::ReasoningText { text } => Some(json!({"text": text, "thought": true})),
            ResponsePart::Source { .. } => None,
        })
        .collect();

    json!({
        "candidates": [{
            "content": {"role": "model", "parts": parts},
            "finishReason": gemini_finish_reason(response.finish_reason),
            "index": 0,
        }],
        "usageMetadata": {
            "promptTokenCount": response.usage.input_tokens,
            "candidatesTokenCount": response.usage.output_tokens,
            "totalTokenCount": response.usage.total_tokens,
            "cachedContentTokenCount": usage_or_null(response.usage.cached_input_tokens),
            "thoughtsTokenCount": usage_or_null(response.usage.reasoning_tokens),
        },
        "modelVersion": response.provider_model,
    })
}
