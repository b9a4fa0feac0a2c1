//! Resolves a client-supplied model name into an ordered list of provider candidates.

use std::sync::atomic::{AtomicU64, Ordering};

use config::{Config, ModelTarget, Selector};
use dashmap::DashMap;
use rand::seq::SliceRandom;

use crate::accounting::Accounting;
use crate::classifier::{self, apply_agentic_boost};
use crate::error::{LlmError, Result};
use crate::unified::UnifiedRequest;

/// A resolved dispatch target: a provider name paired with the upstream model to call on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
}

/// Process-wide round-robin counters, one per alias name, shared across all requests.
#[derive(Default)]
pub struct Router {
    round_robin: DashMap<String, AtomicU64>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `model_name` against the given configuration snapshot.
    ///
    /// If `model_name` is the reserved string `auto`, classifies `request` and re-enters
    /// resolution against the tier's configured alias.
    pub fn resolve(&self, model_name: &str, request: &UnifiedRequest, config: &Config, accounting: &Accounting) -> Result<Vec<Candidate>> {
        if model_name == "auto" {
            return self.resolve_auto(request, config, accounting);
        }

        let alias = config
            .llm
            .alias(model_name)
            .ok_or_else(|| LlmError::UnknownModel(model_name.to_string()))?;

        let ordered = self.order_targets(model_name, alias.selector, &alias.targets);
        Ok(ordered
            .into_iter()
            .map(|t| Candidate {
                provider: t.provider.clone(),
                model: t.model.clone(),
            })
            .collect())
    }

    fn resolve_auto(&self, request: &UnifiedRequest, config: &Config, accounting: &Accounting) -> Result<Vec<Candidate>> {
        let auto = &config.llm.auto;
        if !auto.enabled {
            return Err(LlmError::ConfigError("auto routing requested but `auto` is disabled".into()));
        }

        let mut classification = classifier::classify(request, &auto.classifier);
        apply_agentic_boost(&mut classification, auto.agentic_boost_threshold);

        let alias = match classification.tier {
            config::classifier::Tier::Heartbeat => &auto.tier_models.heartbeat,
            config::classifier::Tier::Simple => &auto.tier_models.simple,
            config::classifier::Tier::Medium => &auto.tier_models.medium,
            config::classifier::Tier::Complex => &auto.tier_models.complex,
            config::classifier::Tier::Reasoning => &auto.tier_models.reasoning,
        };

        if alias.is_empty() {
            return Err(LlmError::ConfigError(format!(
                "auto.tier_models has no alias configured for tier `{}`",
                classification.tier
            )));
        }

        // Non-fatal: a failed classifier log must never fail the request.
        accounting.log_classification(request.request_id, &classification, alias);

        self.resolve(alias, request, config, accounting)
    }

    fn order_targets(&self, alias_name: &str, selector: Selector, targets: &[ModelTarget]) -> Vec<ModelTarget> {
        match selector {
            Selector::Priority => targets.to_vec(),
            Selector::Random => {
                let mut shuffled = targets.to_vec();
                shuffled.shuffle(&mut rand::rng());
                shuffled
            }
            Selector::RoundRobin => {
                if targets.is_empty() {
                    return Vec::new();
                }
                let counter = self.round_robin.entry(alias_name.to_string()).or_default();
                let start = counter.fetch_add(1, Ordering::Relaxed) as usize % targets.len();
                targets.iter().cycle().skip(start).take(targets.len()).cloned().collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> Vec<ModelTarget> {
        (0..n)
            .map(|i| ModelTarget {
                provider: format!("provider-{i}"),
                model: "m".to_string(),
            })
            .collect()
    }

    #[test]
    fn priority_preserves_order() {
        let router = Router::new();
        let targets = targets(3);
        let ordered = router.order_targets("alias", Selector::Priority, &targets);
        assert_eq!(ordered, targets);
    }

    #[test]
    fn round_robin_distributes_evenly() {
        let router = Router::new();
        let targets = targets(3);
        let mut counts = std::collections::HashMap::new();

        for _ in 0..9 {
            let ordered = router.order_targets("alias", Selector::RoundRobin, &targets);
            *counts.entry(ordered[0].provider.clone()).or_insert(0) += 1;
        }

        for count in counts.values() {
            assert_eq!(*count, 3);
        }
    }
}
