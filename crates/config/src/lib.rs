//! Plexus configuration structures mapping the gateway's YAML configuration file.

pub mod classifier;
pub mod error;
mod http_types;
mod llm;
mod loader;
mod pricing;
mod resilience;
mod server;
mod telemetry;

use std::path::Path;

pub use http_types::{HeaderName, HeaderValue};
pub use llm::{AutoConfig, LlmConfig, ModelAlias, ModelTarget, ProviderConfig, ProviderType, Selector, TierModels};
pub use pricing::{EnergyConfig, PricingConfig, PricingEntry, TieredBracket};
pub use resilience::{CooldownPolicyConfig, ResilienceConfig, RetryConfig};
pub use server::ServerConfig;
pub use telemetry::OtlpProtocol;
pub use telemetry::exporters::{
    ExportersConfig, GrpcHeaders, HttpHeaders, OtlpExporterConfig, OtlpGrpcConfig, OtlpHttpConfig,
};
pub use telemetry::tracing::{PropagationConfig, TracingConfig};
pub use telemetry::{LogsConfig, MetricsConfig, TelemetryConfig};

use serde::Deserialize;

/// Root configuration structure for the Plexus gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server binding.
    pub server: ServerConfig,
    /// Providers, model aliases, and auto-routing.
    pub llm: LlmConfig,
    /// Retry and cooldown policy.
    pub resilience: ResilienceConfig,
    /// Cost and energy-estimation tables.
    pub pricing: PricingConfig,
    /// Structured observability (logs/metrics/traces).
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load and validate configuration from the YAML file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Re-validate a configuration snapshot (e.g. after a hot reload).
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = serde_yaml::from_str("").unwrap();
        assert_debug_snapshot!(&config);
    }
}
