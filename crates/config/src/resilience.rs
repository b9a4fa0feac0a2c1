//! Retry and cooldown policy: the `resilience` top-level configuration key.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub cooldown: CooldownPolicyConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            cooldown: CooldownPolicyConfig::default(),
        }
    }
}

/// Per-attempt backoff for the dispatcher's candidate loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub base_ms: u64,
    pub multiplier: f64,
    pub cap_ms: u64,
    pub jitter_pct: f64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_ms: 100,
            multiplier: 2.0,
            cap_ms: 2_000,
            jitter_pct: 0.25,
            max_attempts: 3,
        }
    }
}

/// Base cooldown durations per failure reason, and the exponential backoff applied to repeat
/// offenders.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CooldownPolicyConfig {
    pub transient_secs: u64,
    pub rate_limited_min_secs: u64,
    pub auth_secs: u64,
    pub backoff_multiplier: f64,
    pub backoff_cap_secs: u64,
}

impl Default for CooldownPolicyConfig {
    fn default() -> Self {
        Self {
            transient_secs: 15,
            rate_limited_min_secs: 30,
            auth_secs: 300,
            backoff_multiplier: 2.0,
            backoff_cap_secs: 300,
        }
    }
}
