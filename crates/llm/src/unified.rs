//! The dialect-neutral call model.
//!
//! Every ingress translator produces a [`UnifiedRequest`]; every provider adapter consumes one
//! and returns either a [`UnifiedResponse`] or a stream of [`StreamEvent`]s. Nothing downstream
//! of ingress or upstream of egress knows which wire dialect a request came from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The wire dialect a client request arrived in (and that its response must be shaped for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    OpenaiChat,
    OpenaiResponses,
    AnthropicMessages,
    Gemini,
}

/// A provider-neutral request, ready to be routed and dispatched.
#[derive(Debug, Clone)]
pub struct UnifiedRequest {
    /// Logical model identifier as supplied by the client: a configured alias, or `auto`.
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub tool_choice: ToolChoice,
    pub response_format: ResponseFormat,
    pub sampling: Sampling,
    pub stream: bool,
    pub incoming_dialect: Dialect,
    pub request_id: Uuid,
}

impl UnifiedRequest {
    /// Concatenation of all textual content, used by the classifier's token estimate.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            message.append_text(&mut out);
        }
        out
    }

    /// The text of the last user message, or empty string if none exists.
    pub fn last_user_text(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User { content } => Some(content_to_text(content)),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// One turn in the conversation.
#[derive(Debug, Clone)]
pub enum Message {
    System { content: String },
    User { content: Vec<ContentPart> },
    Assistant { content: Vec<AssistantPart> },
    Tool { tool_call_id: String, output: ToolOutput },
}

impl Message {
    fn append_text(&self, out: &mut String) {
        match self {
            Message::System { content } => out.push_str(content),
            Message::User { content } => out.push_str(&content_to_text(content)),
            Message::Assistant { content } => {
                for part in content {
                    if let AssistantPart::Text { text } = part {
                        out.push_str(text);
                    }
                }
            }
            Message::Tool { output, .. } => match output {
                ToolOutput::Text(text) => out.push_str(text),
                ToolOutput::Json(value) => {
                    if let Ok(s) = sonic_rs::to_string(value) {
                        out.push_str(&s);
                    }
                }
            },
        }
    }
}

fn content_to_text(parts: &[ContentPart]) -> String {
    let mut out = String::new();
    for part in parts {
        if let ContentPart::Text { text } = part {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
    }
    out
}

/// A part of a System/User message's content.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text { text: String },
    File { media_type: String, data: String, filename: Option<String> },
    ImageUrl { url: String },
    Audio { format: String, data: String },
}

/// A part of an Assistant message's content.
#[derive(Debug, Clone)]
pub enum AssistantPart {
    Text { text: String },
    ToolCall { id: String, name: String, input: Value },
}

/// The payload carried by a Tool message.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Json(Value),
    Text(String),
}

/// A tool declaration offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Constrains which tool, if any, the model must call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Specific(String),
}

/// Constrains the shape of the model's textual output.
#[derive(Debug, Clone, Default)]
pub enum ResponseFormat {
    #[default]
    FreeText,
    JsonObject,
    JsonSchema {
        schema: Value,
        name: Option<String>,
        description: Option<String>,
        strict: Option<bool>,
    },
}

/// Sampling parameters, all optional: providers fill in their own defaults.
#[derive(Debug, Clone, Default)]
pub struct Sampling {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub seed: Option<i64>,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Other,
}

/// Token accounting reported by a provider or estimated by a fallback.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cached_input_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
}

/// A part of a non-streaming response's content.
#[derive(Debug, Clone)]
pub enum ResponsePart {
    Text { text: String },
    ReasoningText { text: String },
    ToolCall { id: String, name: String, input: Value },
    Source { url: String, title: Option<String> },
}

/// A complete, non-streaming provider-neutral response.
#[derive(Debug, Clone)]
pub struct UnifiedResponse {
    pub finish_reason: FinishReason,
    pub content: Vec<ResponsePart>,
    pub usage: Usage,
    pub provider_id: String,
    pub provider_model: String,
}

/// The provider- and dialect-independent streaming event vocabulary.
///
/// For any block id, events satisfy `start delta* end`; `finish` occurs at most once and after
/// all blocks have closed or aborted.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextStart { id: String },
    TextDelta { id: String, text: String },
    TextEnd { id: String },
    ReasoningStart { id: String },
    ReasoningDelta { id: String, text: String },
    ReasoningEnd { id: String },
    ToolInputStart { id: String, name: String },
    ToolInputDelta { id: String, delta: String },
    ToolInputEnd { id: String },
    Finish { finish_reason: FinishReason, usage: Option<Usage> },
    Error { message: String },
    Abort,
}

/// Warnings accumulated while translating a dialect request into a [`UnifiedRequest`].
pub type Warnings = Vec<String>;

/// Map of tool-call id to tool name, built while walking assistant messages during ingress.
/// Tool-result messages only carry the call id; the name must be looked up here.
pub type ToolNameMap = HashMap<String, String>;
