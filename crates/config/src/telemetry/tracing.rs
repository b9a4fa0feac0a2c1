use serde::Deserialize;

use super::ExportersConfig;

/// Tracing-specific telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Fraction of requests sampled, in [0, 1].
    pub sampling: f64,
    /// Use a parent-based sampler (always sample if the parent span was sampled).
    pub parent_based_sampler: bool,
    pub collect: CollectConfig,
    pub propagation: PropagationConfig,
    exporters: Option<ExportersConfig>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sampling: 0.15,
            parent_based_sampler: false,
            collect: CollectConfig::default(),
            propagation: PropagationConfig::default(),
            exporters: None,
        }
    }
}

impl TracingConfig {
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}

/// Caps on per-span telemetry collection, bounding memory for long-running spans.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    pub max_events_per_span: usize,
    pub max_attributes_per_span: usize,
    pub max_links_per_span: usize,
    pub max_attributes_per_event: usize,
    pub max_attributes_per_link: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            max_events_per_span: 128,
            max_attributes_per_span: 128,
            max_links_per_span: 128,
            max_attributes_per_event: 128,
            max_attributes_per_link: 128,
        }
    }
}

/// Which trace context propagation formats to honor on inbound requests.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationConfig {
    pub trace_context: bool,
    pub aws_xray: bool,
}
