//! Translates the neutral [`UnifiedResponse`]/[`StreamEvent`] vocabulary back into each client
//! dialect's wire shape.

pub mod nonstreaming;
pub mod streaming;

use crate::unified::FinishReason;

/// Finish-reason mapping shared by every non-streaming and streaming egress translator.
pub(crate) fn openai_finish_reason(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::ToolCalls => "tool_calls",
        FinishReason::ContentFilter => "content_filter",
        FinishReason::Error | FinishReason::Other => "stop",
    }
}

pub(crate) fn anthropic_stop_reason(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "end_turn",
        FinishReason::Length => "max_tokens",
        FinishReason::ToolCalls => "tool_use",
        FinishReason::ContentFilter => "safety",
        FinishReason::Error | FinishReason::Other => "end_turn",
    }
}

pub(crate) fn gemini_finish_reason(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "STOP",
        FinishReason::Length => "MAX_TOKENS",
        FinishReason::ToolCalls => "STOP",
        FinishReason::ContentFilter => "SAFETY",
        FinishReason::Error | FinishReason::Other => "STOP",
    }
}
