//! Loads and validates a configuration snapshot from a YAML file.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::{Config, error::Error};

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Expands `${VAR}` references against the process environment. Missing variables are left
/// untouched so that, e.g., a literal `${...}` in a pricing note doesn't break loading.
fn expand_env(raw: &str) -> String {
    env_pattern()
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(path).map_err(Error::ConfigOpen)?;
    let expanded = expand_env(&raw);
    let config: Config = serde_yaml::from_str(&expanded).map_err(Error::ConfigParse)?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> anyhow::Result<()> {
    for (alias, model) in &config.llm.models {
        for target in &model.targets {
            if config.llm.provider(&target.provider).is_none() {
                return Err(Error::Validation(format!(
                    "model alias `{alias}` targets unknown provider `{}`",
                    target.provider
                ))
                .into());
            }
        }
    }

    if config.llm.auto.enabled {
        let tiers = [
            ("heartbeat", &config.llm.auto.tier_models.heartbeat),
            ("simple", &config.llm.auto.tier_models.simple),
            ("medium", &config.llm.auto.tier_models.medium),
            ("complex", &config.llm.auto.tier_models.complex),
            ("reasoning", &config.llm.auto.tier_models.reasoning),
        ];

        for (tier, alias) in tiers {
            if !alias.is_empty() && config.llm.alias(alias).is_none() {
                return Err(Error::Validation(format!(
                    "auto.tier_models.{tier} references unknown model alias `{alias}`"
                ))
                .into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_env_var() {
        unsafe {
            std::env::set_var("PLEXUS_TEST_VAR", "secret-value");
        }
        assert_eq!(expand_env("api_key: ${PLEXUS_TEST_VAR}"), "api_key: secret-value");
        unsafe {
            std::env::remove_var("PLEXUS_TEST_VAR");
        }
    }

    #[test]
    fn leaves_unknown_env_var_untouched() {
        assert_eq!(expand_env("${PLEXUS_DEFINITELY_UNSET}"), "${PLEXUS_DEFINITELY_UNSET}");
    }
}
