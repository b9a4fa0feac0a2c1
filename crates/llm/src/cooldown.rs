//! Tracks temporarily-disabled providers. Process-wide shared state with exclusive writes and
//! consistent reads; a background sweeper periodically removes expired entries.

use std::sync::Arc;
use std::time::Duration;

use config::CooldownPolicyConfig;
use dashmap::DashMap;
use jiff::{SignedDuration, Timestamp};

/// Why a provider was placed on cooldown; determines the base duration and escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownReason {
    Transient,
    RateLimited,
    Auth,
}

#[derive(Debug, Clone)]
struct CooldownEntry {
    reason: CooldownReason,
    expires_at: Timestamp,
    /// How many times this provider has been placed on cooldown back-to-back; drives the
    /// exponential backoff applied to the next placement.
    strikes: u32,
}

/// Process-wide cooldown map, shared between the dispatcher and the background sweeper.
pub struct CooldownManager {
    entries: DashMap<String, CooldownEntry>,
    policy: CooldownPolicyConfig,
}

impl CooldownManager {
    pub fn new(policy: CooldownPolicyConfig) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            policy,
        })
    }

    /// True iff an unexpired cooldown entry exists for `name` at `now`.
    pub fn is_on_cooldown(&self, name: &str, now: Timestamp) -> bool {
        match self.entries.get(name) {
            Some(entry) => now < entry.expires_at,
            None => false,
        }
    }

    /// Place (or extend) a cooldown, applying exponential backoff on repeat offenses.
    pub fn place_on_cooldown(&self, name: &str, reason: CooldownReason, retry_after: Option<Duration>, now: Timestamp) {
        let base = self.base_duration(reason, retry_after);

        let mut entry = self.entries.entry(name.to_string()).or_insert_with(|| CooldownEntry {
            reason,
            expires_at: now,
            strikes: 0,
        });

        let strikes = if now < entry.expires_at { entry.strikes + 1 } else { 1 };
        let multiplier = self.policy.backoff_multiplier.powi(strikes.saturating_sub(1) as i32);
        let capped = (base.as_secs_f64() * multiplier).min(self.policy.backoff_cap_secs as f64);

        entry.reason = reason;
        entry.strikes = strikes;
        entry.expires_at = now + SignedDuration::from_secs_f64(capped);
    }

    fn base_duration(&self, reason: CooldownReason, retry_after: Option<Duration>) -> Duration {
        match reason {
            CooldownReason::Transient => Duration::from_secs(self.policy.transient_secs),
            CooldownReason::RateLimited => {
                let min = Duration::from_secs(self.policy.rate_limited_min_secs);
                retry_after.map(|ra| ra.max(min)).unwrap_or(min)
            }
            CooldownReason::Auth => Duration::from_secs(self.policy.auth_secs),
        }
    }

    /// Administratively clear one provider's cooldown.
    pub fn clear(&self, name: &str) {
        self.entries.remove(name);
    }

    /// Administratively clear every cooldown.
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    /// Remove expired entries. Readers already tolerate stale entries by checking expiry, so
    /// this is purely a memory-bounding housekeeping pass.
    pub fn sweep(&self, now: Timestamp) {
        self.entries.retain(|_, entry| now < entry.expires_at);
    }

    /// Run the sweeper on an interval until `shutdown` resolves.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(Timestamp::now());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_expires() {
        let manager = CooldownManager::new(CooldownPolicyConfig {
            transient_secs: 10,
            ..CooldownPolicyConfig::default()
        });
        let t0 = Timestamp::now();
        manager.place_on_cooldown("p", CooldownReason::Transient, None, t0);

        assert!(manager.is_on_cooldown("p", t0));
        assert!(manager.is_on_cooldown("p", t0 + SignedDuration::from_secs(5)));
        assert!(!manager.is_on_cooldown("p", t0 + SignedDuration::from_secs(11)));
    }

    #[test]
    fn repeat_offense_backs_off() {
        let manager = CooldownManager::new(CooldownPolicyConfig {
            transient_secs: 10,
            backoff_multiplier: 2.0,
            backoff_cap_secs: 1000,
            ..CooldownPolicyConfig::default()
        });
        let t0 = Timestamp::now();
        manager.place_on_cooldown("p", CooldownReason::Transient, None, t0);
        // Still on cooldown: this placement is a repeat offense and should double the duration.
        manager.place_on_cooldown("p", CooldownReason::Transient, None, t0 + SignedDuration::from_secs(1));

        assert!(manager.is_on_cooldown("p", t0 + SignedDuration::from_secs(15)));
    }

    #[test]
    fn clear_removes_entry() {
        let manager = CooldownManager::new(CooldownPolicyConfig::default());
        let t0 = Timestamp::now();
        manager.place_on_cooldown("p", CooldownReason::Auth, None, t0);
        manager.clear("p");
        assert!(!manager.is_on_cooldown("p", t0));
    }
}
