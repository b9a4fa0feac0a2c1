//! Synthesizes the unified stream's `start delta* end` block invariant over upstream formats
//! (like OpenAI's Chat Completions deltas) that don't mark block boundaries explicitly.

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::unified::{FinishReason, StreamEvent, Usage};

/// What one parsed upstream chunk implies, before block bracketing is applied.
pub enum RawEvent {
    None,
    TextDelta { id: String, text: String },
    ReasoningDelta { id: String, text: String },
    ToolStart { id: String, name: String },
    ToolDelta { id: String, delta: String },
    /// A tool call that arrived whole, with no separate start/delta/stop chunks (e.g. Gemini).
    ToolComplete { id: String, name: String, args_json: String },
    Finish { finish_reason: FinishReason, usage: Option<Usage> },
    Error { message: String },
}

#[derive(Default)]
struct State {
    text_open: Option<String>,
    reasoning_open: Option<String>,
    tool_open: std::collections::HashSet<String>,
}

impl State {
    fn apply(&mut self, raw: RawEvent) -> Vec<StreamEvent> {
        match raw {
            RawEvent::None => vec![],
            RawEvent::TextDelta { id, text } => {
                let mut out = Vec::new();
                if self.text_open.as_deref() != Some(id.as_str()) {
                    out.push(StreamEvent::TextStart { id: id.clone() });
                    self.text_open = Some(id.clone());
                }
                out.push(StreamEvent::TextDelta { id, text });
                out
            }
            RawEvent::ReasoningDelta { id, text } => {
                let mut out = Vec::new();
                if self.reasoning_open.as_deref() != Some(id.as_str()) {
                    out.push(StreamEvent::ReasoningStart { id: id.clone() });
                    self.reasoning_open = Some(id.clone());
                }
                out.push(StreamEvent::ReasoningDelta { id, text });
                out
            }
            RawEvent::ToolStart { id, name } => {
                self.tool_open.insert(id.clone());
                vec![StreamEvent::ToolInputStart { id, name }]
            }
            RawEvent::ToolDelta { id, delta } => {
                if self.tool_open.insert(id.clone()) {
                    // Defensive: a delta arrived before any start chunk was seen.
                    vec![StreamEvent::ToolInputStart { id: id.clone(), name: String::new() }, StreamEvent::ToolInputDelta { id, delta }]
                } else {
                    vec![StreamEvent::ToolInputDelta { id, delta }]
                }
            }
            RawEvent::ToolComplete { id, name, args_json } => vec![
                StreamEvent::ToolInputStart { id: id.clone(), name },
                StreamEvent::ToolInputDelta { id: id.clone(), delta: args_json },
                StreamEvent::ToolInputEnd { id },
            ],
            RawEvent::Finish { finish_reason, usage } => {
                let mut out = Vec::new();
                if let Some(id) = self.text_open.take() {
                    out.push(StreamEvent::TextEnd { id });
                }
                if let Some(id) = self.reasoning_open.take() {
                    out.push(StreamEvent::ReasoningEnd { id });
                }
                for id in self.tool_open.drain() {
                    out.push(StreamEvent::ToolInputEnd { id });
                }
                out.push(StreamEvent::Finish { finish_reason, usage });
                out
            }
            RawEvent::Error { message } => vec![StreamEvent::Error { message }],
        }
    }
}

/// Apply block-bracketing to a stream of raw upstream JSON chunks.
pub fn track<F>(events: impl Stream<Item = Value> + Send + 'static, parse: F) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    F: Fn(&Value) -> RawEvent + Send + 'static,
{
    events
        .scan(State::default(), move |state, value| {
            let raw = parse(&value);
            futures::future::ready(Some(state.apply(raw)))
        })
        .flat_map(stream::iter)
}
