use serde::Deserialize;

use super::ExportersConfig;

/// Metrics-specific telemetry overrides. Falls back to the global exporters when unset.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    exporters: Option<ExportersConfig>,
}

impl MetricsConfig {
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
