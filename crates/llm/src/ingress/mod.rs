//! Translates each client dialect's request body into a [`UnifiedRequest`].
//!
//! Every translator is total: unknown fields are dropped silently (or with a warning where the
//! drop is semantically notable); only a missing *required* field fails with
//! [`crate::error::LlmError::InvalidRequest`].

pub mod anthropic;
pub mod gemini;
pub mod openai_chat;
pub mod openai_responses;

use crate::unified::Warnings;

/// Convenience carrier so translators can build up warnings inline.
pub(crate) fn warn(warnings: &mut Warnings, message: impl Into<String>) {
    warnings.push(message.into());
}

/// Parses a data-URI (`data:<media-type>;base64,<data>`) into `(media_type, base64_data)`, or
/// treats the whole string as an opaque URL reference if it isn't one.
pub(crate) fn parse_data_uri(value: &str) -> Option<(String, String)> {
    let rest = value.strip_prefix("data:")?;
    let (media_type, data) = rest.split_once(";base64,")?;
    Some((media_type.to_string(), data.to_string()))
}
