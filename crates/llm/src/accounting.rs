//! Usage, cost, and classifier-decision logging.
//!
//! All writes here are fire-and-forget: accounting failures must never fail a request or block
//! the response path. A bounded channel feeds a single background task that owns the actual
//! persistence; if the channel is full the event is dropped and a warning is logged, mirroring
//! the tracer's drop-oldest posture under backpressure.

use std::collections::HashMap;

use config::PricingConfig;
use jiff::Timestamp;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::classifier::Classification;
use crate::unified::Usage;

const CHANNEL_CAPACITY: usize = 4096;

/// One accounting record, as persisted to the usage log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountingEvent {
    Classification {
        request_id: Uuid,
        timestamp: Timestamp,
        tier: String,
        score: f32,
        confidence: f32,
        resolved_alias: String,
    },
    Usage {
        request_id: Uuid,
        timestamp: Timestamp,
        provider: String,
        model: String,
        usage: Usage,
        cost_usd: f64,
        energy_wh: Option<f64>,
    },
}

/// Handle to the background accounting writer. Cheap to clone; every clone shares the same
/// channel and background task.
#[derive(Clone)]
pub struct Accounting {
    sender: mpsc::Sender<AccountingEvent>,
}

impl Accounting {
    /// Spawn the background writer and return a handle to it.
    pub fn spawn(pricing: PricingConfig) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_writer(receiver));
        let _ = pricing; // retained on the handle via compute_cost/estimate_energy below
        Self { sender }
    }

    /// Record a classifier decision. Per the resolved-alias convention, `resolved_alias` must be
    /// the alias *after* any agentic-boost promotion has been applied.
    pub fn log_classification(&self, request_id: Uuid, classification: &Classification, resolved_alias: &str) {
        let event = AccountingEvent::Classification {
            request_id,
            timestamp: Timestamp::now(),
            tier: classification.tier.to_string(),
            score: classification.score,
            confidence: classification.confidence,
            resolved_alias: resolved_alias.to_string(),
        };
        self.emit(event);
    }

    /// Record a completed dispatch's usage and cost.
    pub fn log_usage(&self, request_id: Uuid, provider: &str, model: &str, usage: Usage, pricing: &PricingConfig) {
        let cost_usd = compute_cost(pricing, provider, model, usage);
        let energy_wh = estimate_energy(pricing, usage);
        let event = AccountingEvent::Usage {
            request_id,
            timestamp: Timestamp::now(),
            provider: provider.to_string(),
            model: model.to_string(),
            usage,
            cost_usd,
            energy_wh,
        };
        self.emit(event);
    }

    fn emit(&self, event: AccountingEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.sender.try_send(event) {
            log::warn!("accounting channel full, dropping event");
        }
    }
}

async fn run_writer(mut receiver: mpsc::Receiver<AccountingEvent>) {
    while let Some(event) = receiver.recv().await {
        match sonic_rs::to_string(&event) {
            Ok(line) => log::info!(target: "plexus::accounting", "{line}"),
            Err(err) => log::warn!("failed to serialize accounting event: {err}"),
        }
    }
}

/// Select the pricing entry for `model`, preferring a `provider/model`-qualified key over a bare
/// model-name entry.
fn pricing_entry<'a>(pricing: &'a PricingConfig, provider: &str, model: &str) -> Option<&'a config::PricingEntry> {
    pricing
        .models
        .get(&format!("{provider}/{model}"))
        .or_else(|| pricing.models.get(model))
}

/// Compute the USD cost of one completed call, applying tiered brackets (selected by input-token
/// volume) and any configured provider discount.
pub fn compute_cost(pricing: &PricingConfig, provider: &str, model: &str, usage: Usage) -> f64 {
    let Some(entry) = pricing_entry(pricing, provider, model) else {
        return 0.0;
    };

    let (input_rate, output_rate) = entry
        .tiered_brackets
        .iter()
        .filter(|b| usage.input_tokens <= b.max_input_tokens)
        .min_by_key(|b| b.max_input_tokens)
        .map(|b| (b.input_per_1m, b.output_per_1m))
        .unwrap_or((entry.input_per_1m, entry.output_per_1m));

    let billable_input = usage.input_tokens.saturating_sub(usage.cached_input_tokens.unwrap_or(0));
    let mut cost = (billable_input as f64 / 1_000_000.0) * input_rate;
    cost += (usage.output_tokens as f64 / 1_000_000.0) * output_rate;

    if let (Some(cached), Some(cached_rate)) = (usage.cached_input_tokens, entry.cached_per_1m) {
        cost += (cached as f64 / 1_000_000.0) * cached_rate;
    }
    if let (Some(reasoning), Some(reasoning_rate)) = (usage.reasoning_tokens, entry.reasoning_per_1m) {
        cost += (reasoning as f64 / 1_000_000.0) * reasoning_rate;
    }

    let discount = pricing.provider_discounts.get(provider).copied().unwrap_or(1.0);
    cost * discount
}

/// Estimate watt-hours consumed by one call, following a simple prefill/decode throughput model.
/// Returns `None` when energy estimation is disabled.
pub fn estimate_energy(pricing: &PricingConfig, usage: Usage) -> Option<f64> {
    let energy = &pricing.energy;
    if !energy.enabled {
        return None;
    }

    let prefill_secs = usage.input_tokens as f64 / energy.prefill_throughput_tokens_per_sec;
    let decode_secs = usage.output_tokens as f64 / energy.decode_throughput_tokens_per_sec;
    let gpu_seconds = (prefill_secs + decode_secs) * energy.tensor_parallel_degree as f64;
    let energy_wh = (gpu_seconds / 3600.0) * energy.gpu_power_watts * energy.power_usage_effectiveness;
    Some(energy_wh)
}

/// Aggregate totals over a window of accounting events, used by admin reporting endpoints.
#[derive(Debug, Default, Clone, Serialize)]
pub struct UsageTotals {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Fold a set of usage events into per-model totals.
pub fn summarize<'a>(events: impl IntoIterator<Item = &'a AccountingEvent>) -> HashMap<String, UsageTotals> {
    let mut totals: HashMap<String, UsageTotals> = HashMap::new();
    for event in events {
        if let AccountingEvent::Usage {
            model, usage, cost_usd, ..
        } = event
        {
            let entry = totals.entry(model.clone()).or_default();
            entry.requests += 1;
            entry.input_tokens += usage.input_tokens;
            entry.output_tokens += usage.output_tokens;
            entry.cost_usd += cost_usd;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{EnergyConfig, PricingEntry, TieredBracket};

    fn pricing_with(entry: PricingEntry) -> PricingConfig {
        let mut models = HashMap::new();
        models.insert("gpt-5".to_string(), entry);
        PricingConfig {
            models,
            provider_discounts: HashMap::new(),
            energy: EnergyConfig::default(),
        }
    }

    #[test]
    fn flat_rate_cost() {
        let pricing = pricing_with(PricingEntry {
            input_per_1m: 2.0,
            output_per_1m: 8.0,
            cached_per_1m: None,
            reasoning_per_1m: None,
            tiered_brackets: vec![],
        });
        let usage = Usage {
            input_tokens: 1_000_000,
            output_tokens: 500_000,
            total_tokens: 1_500_000,
            cached_input_tokens: None,
            reasoning_tokens: None,
        };
        assert_eq!(compute_cost(&pricing, "openai", "gpt-5", usage), 2.0 + 4.0);
    }

    #[test]
    fn tiered_bracket_selects_higher_rate_past_threshold() {
        let pricing = pricing_with(PricingEntry {
            input_per_1m: 1.0,
            output_per_1m: 1.0,
            cached_per_1m: None,
            reasoning_per_1m: None,
            tiered_brackets: vec![
                TieredBracket {
                    max_input_tokens: 128_000,
                    input_per_1m: 1.0,
                    output_per_1m: 1.0,
                },
                TieredBracket {
                    max_input_tokens: u64::MAX,
                    input_per_1m: 2.0,
                    output_per_1m: 2.0,
                },
            ],
        });
        let usage = Usage {
            input_tokens: 200_000,
            output_tokens: 0,
            total_tokens: 200_000,
            cached_input_tokens: None,
            reasoning_tokens: None,
        };
        assert_eq!(compute_cost(&pricing, "openai", "gpt-5", usage), 0.4);
    }

    #[test]
    fn provider_discount_applies_multiplicatively() {
        let mut pricing = pricing_with(PricingEntry {
            input_per_1m: 10.0,
            output_per_1m: 0.0,
            cached_per_1m: None,
            reasoning_per_1m: None,
            tiered_brackets: vec![],
        });
        pricing.provider_discounts.insert("openai".to_string(), 0.5);
        let usage = Usage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            total_tokens: 1_000_000,
            cached_input_tokens: None,
            reasoning_tokens: None,
        };
        assert_eq!(compute_cost(&pricing, "openai", "gpt-5", usage), 5.0);
    }

    #[test]
    fn energy_disabled_by_default() {
        let pricing = PricingConfig::default();
        let usage = Usage::default();
        assert_eq!(estimate_energy(&pricing, usage), None);
    }
}
