use serde::Deserialize;

use super::ExportersConfig;

/// Logs-specific telemetry overrides. Falls back to the global exporters when unset.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    exporters: Option<ExportersConfig>,
}

impl LogsConfig {
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
