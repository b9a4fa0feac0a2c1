//! Cost and energy-estimation configuration: the `pricing` top-level configuration key.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Per-model pricing, keyed by the upstream model name.
    pub models: HashMap<String, PricingEntry>,
    /// Multiplier applied to the computed cost for a given provider (e.g. a negotiated discount).
    #[serde(default)]
    pub provider_discounts: HashMap<String, f64>,
    pub energy: EnergyConfig,
}

/// Per-million-token rates for one model. A provider-specific entry, if configured, takes
/// precedence over a bare model-name entry.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PricingEntry {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
    pub cached_per_1m: Option<f64>,
    pub reasoning_per_1m: Option<f64>,
    #[serde(default)]
    pub tiered_brackets: Vec<TieredBracket>,
}

/// A volume bracket selected by input-token count, overriding the entry's flat rates above that
/// threshold (e.g. Gemini's doubled rate past 128K input tokens).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TieredBracket {
    pub max_input_tokens: u64,
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

/// Constants feeding the inference energy-footprint estimate. All hard-coded in the reference
/// implementation; here they are configuration with the same defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnergyConfig {
    pub enabled: bool,
    pub tensor_parallel_degree: u32,
    pub kv_cache_per_user_mb: f64,
    pub prefill_throughput_tokens_per_sec: f64,
    pub decode_throughput_tokens_per_sec: f64,
    pub gpu_power_watts: f64,
    pub power_usage_effectiveness: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tensor_parallel_degree: 1,
            kv_cache_per_user_mb: 16.0,
            prefill_throughput_tokens_per_sec: 4000.0,
            decode_throughput_tokens_per_sec: 120.0,
            gpu_power_watts: 700.0,
            power_usage_effectiveness: 1.2,
        }
    }
}
