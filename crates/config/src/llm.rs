//! Provider, model-alias, and auto-routing configuration: the `providers`, `models`, and `auto`
//! top-level keys of the configuration file.

use std::collections::HashMap;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::classifier::ClassifierConfig;

/// The wire protocol an upstream provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Openai,
    Anthropic,
    Gemini,
    Openrouter,
}

/// One upstream credential and endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: ProviderType,
    pub base_url: Url,
    pub api_key: SecretString,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sampling parameters this provider rejects for certain models (e.g. `temperature` on
    /// reasoning-only models) and must be stripped from the wire request before sending.
    #[serde(default)]
    pub strip_parameters: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// One target a model alias can resolve to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModelTarget {
    pub provider: String,
    pub model: String,
}

/// How an alias with multiple targets picks one at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Selector {
    Random,
    #[default]
    Priority,
    RoundRobin,
}

/// A logical model name the router resolves to one or more provider targets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelAlias {
    #[serde(default)]
    pub selector: Selector,
    pub targets: Vec<ModelTarget>,
}

/// Which alias each classifier tier routes to.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TierModels {
    pub heartbeat: String,
    pub simple: String,
    pub medium: String,
    pub complex: String,
    pub reasoning: String,
}

/// Configuration for the `auto` reserved model name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoConfig {
    pub enabled: bool,
    pub tier_models: TierModels,
    pub agentic_boost_threshold: f32,
    pub classifier: ClassifierConfig,
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tier_models: TierModels::default(),
            agentic_boost_threshold: 0.8,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Top-level `providers`/`models`/`auto` configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub providers: Vec<ProviderConfig>,
    pub models: indexmap::IndexMap<String, ModelAlias>,
    pub auto: AutoConfig,
}

impl LlmConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn alias(&self, name: &str) -> Option<&ModelAlias> {
        self.models.get(name)
    }
}
