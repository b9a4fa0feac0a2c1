//! Provider adapters: per-upstream-type request building, invocation, and error classification.
//!
//! Adapters are registered at startup and looked up by [`config::ProviderType`]; the dispatcher
//! never branches on provider type itself.

mod anthropic;
pub(crate) mod block_tracking;
mod gemini;
mod openai;

use async_trait::async_trait;
use config::ProviderConfig;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::unified::{StreamEvent, UnifiedRequest, UnifiedResponse};

/// A built wire-format request ready to send upstream.
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

/// Per-provider-type capability set: render, invoke, invoke-streaming.
#[async_trait]
pub trait Provider: Send + Sync {
    fn build_request(&self, request: &UnifiedRequest, upstream_model: &str, provider: &ProviderConfig) -> Result<WireRequest>;

    async fn invoke(&self, wire: WireRequest, provider: &ProviderConfig) -> Result<UnifiedResponse>;

    async fn invoke_stream(&self, wire: WireRequest, provider: &ProviderConfig) -> Result<BoxStream<'static, StreamEvent>>;
}

/// Look up the adapter for a provider type. Adapters are stateless; this always succeeds.
pub fn for_type(provider_type: config::ProviderType) -> Box<dyn Provider> {
    match provider_type {
        config::ProviderType::Openai => Box::new(openai::OpenaiProvider),
        // OpenRouter speaks the OpenAI Chat Completions wire format.
        config::ProviderType::Openrouter => Box::new(openai::OpenaiProvider),
        config::ProviderType::Anthropic => Box::new(anthropic::AnthropicProvider),
        config::ProviderType::Gemini => Box::new(gemini::GeminiProvider),
    }
}

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenaiProvider;
