//! Orchestrates one request end to end: routing, cooldown-aware candidate iteration, provider
//! invocation with retry/backoff, and egress handoff.
//!
//! The dispatcher never talks to the wire directly; it holds one [`Provider`] adapter per
//! candidate and leans on [`crate::http_client`] through it. Streaming and non-streaming requests
//! share the same candidate loop; only the final leg (egress translation) differs.

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use futures::stream::{self, BoxStream, StreamExt};
use jiff::Timestamp;
use rand::Rng;
use serde_json::Value;
use uuid::Uuid;

use crate::accounting::Accounting;
use crate::cooldown::{CooldownManager, CooldownReason};
use crate::egress::streaming::SseFrame;
use crate::egress::streaming::{anthropic::AnthropicTransducer, gemini::GeminiTransducer, openai_chat::OpenaiChatTransducer, openai_responses::OpenaiResponsesTransducer};
use crate::egress::nonstreaming;
use crate::error::{ErrorClass, LlmError, Result};
use crate::provider::{self, WireRequest};
use crate::router::{Candidate, Router};
use crate::tracer::{Tracer, TracerSink};
use crate::unified::{Dialect, StreamEvent, UnifiedRequest};

/// The two shapes a dispatched request can produce for its caller.
pub enum DispatchOutcome {
    NonStreaming(Value),
    Streaming(BoxStream<'static, SseFrame>),
}

/// Process-wide collaborators the dispatcher needs on every call. Cheap to clone; held once by
/// the application state and threaded through to each request.
#[derive(Clone)]
pub struct Dispatcher {
    pub router: Arc<Router>,
    pub cooldown: Arc<CooldownManager>,
    pub accounting: Accounting,
    pub tracer_sink: TracerSink,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, cooldown: Arc<CooldownManager>, accounting: Accounting, tracer_sink: TracerSink) -> Self {
        Self { router, cooldown, accounting, tracer_sink }
    }

    pub async fn dispatch(&self, request: UnifiedRequest, config: &Config) -> Result<DispatchOutcome> {
        let mut tracer = Tracer::new(request.request_id, self.tracer_sink.clone());

        let candidates = self.router.resolve(&request.model, &request, config, &self.accounting)?;
        if candidates.is_empty() {
            return Err(LlmError::NoEligibleProvider(request.model.clone()));
        }

        let retry = &config.resilience.retry;
        let mut last_error: Option<LlmError> = None;
        let mut attempt: u32 = 0;

        for candidate in &candidates {
            if attempt >= retry.max_attempts {
                break;
            }

            let now = Timestamp::now();
            if self.cooldown.is_on_cooldown(&candidate.provider, now) {
                continue;
            }

            let Some(provider_config) = config.llm.provider(&candidate.provider) else {
                continue;
            };
            if !provider_config.enabled {
                continue;
            }

            attempt += 1;
            if attempt > 1 {
                tokio::time::sleep(backoff_delay(retry, attempt)).await;
            }

            let adapter = provider::for_type(provider_config.r#type);
            let wire = match adapter.build_request(&request, &candidate.model, provider_config) {
                Ok(wire) => wire,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };
            tracer.record_provider_request(wire.body.clone());

            match self.invoke_candidate(&*adapter, wire, provider_config, candidate, &request, config, &mut tracer).await {
                Ok(outcome) => {
                    tracer.finish();
                    return Ok(outcome);
                }
                Err(err) => {
                    tracer.record_error(err.to_string());
                    self.handle_failure(candidate, &err, now);
                    let fatal = err.class() == ErrorClass::Fatal;
                    last_error = Some(err);
                    if fatal {
                        break;
                    }
                }
            }
        }

        tracer.finish();
        Err(LlmError::AllProvidersFailed(
            last_error.map(|e| e.to_string()).unwrap_or_else(|| "no candidates attempted".to_string()),
        ))
    }

    async fn invoke_candidate(
        &self,
        adapter: &dyn provider::Provider,
        wire: WireRequest,
        provider_config: &config::ProviderConfig,
        candidate: &Candidate,
        request: &UnifiedRequest,
        config: &Config,
        tracer: &mut Tracer,
    ) -> Result<DispatchOutcome> {
        if request.stream {
            let events = adapter.invoke_stream(wire, provider_config).await?;
            let dialect = request.incoming_dialect;
            let model = candidate.model.clone();
            let provider_name = candidate.provider.clone();
            let accounting = self.accounting.clone();
            let pricing = config.pricing.clone();
            let frames = transduce_stream(dialect, model, events, provider_name, accounting, pricing);
            Ok(DispatchOutcome::Streaming(frames.boxed()))
        } else {
            let mut response = adapter.invoke(wire, provider_config).await?;
            response.provider_id = candidate.provider.clone();
            tracer.record_provider_response(serde_json::json!({
                "finish_reason": format!("{:?}", response.finish_reason),
                "usage": response.usage,
            }));

            self.accounting.log_usage(request.request_id, &candidate.provider, &candidate.model, response.usage, &config.pricing);

            let body = match request.incoming_dialect {
                Dialect::OpenaiChat => nonstreaming::to_openai_chat(&response, request.request_id),
                Dialect::OpenaiResponses => nonstreaming::to_openai_responses(&response, request.request_id),
                Dialect::AnthropicMessages => nonstreaming::to_anthropic_messages(&response, request.request_id),
                Dialect::Gemini => nonstreaming::to_gemini(&response),
            };
            tracer.record_client_response(body.clone());
            Ok(DispatchOutcome::NonStreaming(body))
        }
    }

    fn handle_failure(&self, candidate: &Candidate, error: &LlmError, now: Timestamp) {
        let reason = match error {
            LlmError::UpstreamTransient(_) => Some(CooldownReason::Transient),
            LlmError::UpstreamRateLimited { .. } => Some(CooldownReason::RateLimited),
            LlmError::UpstreamAuth(_) => Some(CooldownReason::Auth),
            _ => None,
        };
        let Some(reason) = reason else { return };

        let retry_after = match error {
            LlmError::UpstreamRateLimited { retry_after } => *retry_after,
            _ => None,
        };
        self.cooldown.place_on_cooldown(&candidate.provider, reason, retry_after, now);
    }
}

/// Exponential backoff with full jitter, capped, for the `attempt`-th retry (1-indexed).
fn backoff_delay(retry: &config::RetryConfig, attempt: u32) -> Duration {
    let exp = retry.base_ms as f64 * retry.multiplier.powi(attempt.saturating_sub(1) as i32);
    let capped = exp.min(retry.cap_ms as f64);
    let jitter = 1.0 - retry.jitter_pct + rand::rng().random::<f64>() * (2.0 * retry.jitter_pct);
    Duration::from_secs_f64((capped * jitter).max(0.0) / 1000.0)
}

/// Feed a provider's neutral event stream through the client dialect's streaming transducer,
/// logging usage accounting once the terminal `Finish` event is observed.
fn transduce_stream(
    dialect: Dialect,
    model: String,
    events: BoxStream<'static, StreamEvent>,
    provider_name: String,
    accounting: Accounting,
    pricing: config::PricingConfig,
) -> BoxStream<'static, SseFrame> {
    let request_id = Uuid::new_v4();
    let created = jiff::Timestamp::now().as_second();

    match dialect {
        Dialect::OpenaiChat => {
            let mut transducer = OpenaiChatTransducer::new(format!("chatcmpl-{request_id}"), created, model.clone());
            events
                .flat_map(move |event| {
                    if let StreamEvent::Finish { usage: Some(usage), .. } = &event {
                        accounting.log_usage(request_id, &provider_name, &model, *usage, &pricing);
                    }
                    stream::iter(transducer.push(event))
                })
                .boxed()
        }
        Dialect::OpenaiResponses => {
            let mut transducer = OpenaiResponsesTransducer::new(format!("resp-{request_id}"), created, model.clone());
            events
                .flat_map(move |event| {
                    if let StreamEvent::Finish { usage: Some(usage), .. } = &event {
                        accounting.log_usage(request_id, &provider_name, &model, *usage, &pricing);
                    }
                    stream::iter(transducer.push(event))
                })
                .boxed()
        }
        Dialect::AnthropicMessages => {
            let mut transducer = AnthropicTransducer::new(format!("msg-{request_id}"), model.clone(), 0);
            events
                .flat_map(move |event| {
                    if let StreamEvent::Finish { usage: Some(usage), .. } = &event {
                        accounting.log_usage(request_id, &provider_name, &model, *usage, &pricing);
                    }
                    stream::iter(transducer.push(event))
                })
                .boxed()
        }
        Dialect::Gemini => {
            let mut transducer = GeminiTransducer::new(model.clone());
            events
                .flat_map(move |event| {
                    if let StreamEvent::Finish { usage: Some(usage), .. } = &event {
                        accounting.log_usage(request_id, &provider_name, &model, *usage, &pricing);
                    }
                    stream::iter(transducer.push(event))
                })
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_config() -> config::RetryConfig {
        config::RetryConfig {
            base_ms: 100,
            multiplier: 2.0,
            cap_ms: 2_000,
            jitter_pct: 0.25,
            max_attempts: 3,
        }
    }

    #[test]
    fn backoff_delay_grows_and_respects_the_cap() {
        let retry = retry_config();

        for attempt in 1..=6 {
            let delay = backoff_delay(&retry, attempt);
            let exp = retry.base_ms as f64 * retry.multiplier.powi((attempt - 1) as i32);
            let capped = exp.min(retry.cap_ms as f64);
            let lower = (capped * (1.0 - retry.jitter_pct) / 1000.0).max(0.0);
            let upper = capped * (1.0 + retry.jitter_pct) / 1000.0;
            let secs = delay.as_secs_f64();
            assert!(secs >= lower - 1e-9 && secs <= upper + 1e-9, "attempt {attempt}: {secs} not in [{lower}, {upper}]");
        }
    }

    #[test]
    fn backoff_delay_never_exceeds_the_jittered_cap() {
        let retry = retry_config();
        let capped_upper = retry.cap_ms as f64 * (1.0 + retry.jitter_pct) / 1000.0;

        for attempt in 1..=20 {
            let delay = backoff_delay(&retry, attempt).as_secs_f64();
            assert!(delay <= capped_upper + 1e-9);
        }
    }
}
