//! Tunable tables for the auto-routing classifier (`auto.classifier` in the configuration file).
//!
//! If `dimension_weights` is present in the file, all sixteen weights are required together —
//! see [`DimensionWeights`].

use serde::{Deserialize, Serialize};

/// Ordinal complexity class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Heartbeat,
    Simple,
    Medium,
    Complex,
    Reasoning,
}

impl Tier {
    pub fn promote(self) -> Tier {
        match self {
            Tier::Heartbeat => Tier::Heartbeat,
            Tier::Simple => Tier::Medium,
            Tier::Medium => Tier::Complex,
            Tier::Complex => Tier::Reasoning,
            Tier::Reasoning => Tier::Reasoning,
        }
    }
}

/// Tunable boundaries, weights, and thresholds for [`crate::classify`]... see the `llm` crate's
/// `classifier` module for the scoring function itself; this crate only holds its configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub max_tokens_force_complex: u32,
    pub reasoning_override_min_matches: u32,
    pub reasoning_override_min_score: f32,
    pub boundaries: Boundaries,
    pub confidence_steepness: f32,
    pub ambiguity_threshold: f32,
    pub ambiguous_default_tier: Tier,
    pub dimension_weights: DimensionWeights,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_tokens_force_complex: 6000,
            reasoning_override_min_matches: 2,
            reasoning_override_min_score: 1.2,
            boundaries: Boundaries::default(),
            confidence_steepness: 1.5,
            ambiguity_threshold: 0.35,
            ambiguous_default_tier: Tier::Medium,
            dimension_weights: DimensionWeights::default(),
        }
    }
}

/// Score thresholds separating adjacent tiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Boundaries {
    pub simple_medium: f32,
    pub medium_complex: f32,
    pub complex_reasoning: f32,
}

impl Default for Boundaries {
    fn default() -> Self {
        Self {
            simple_medium: 0.8,
            medium_complex: 2.0,
            complex_reasoning: 3.5,
        }
    }
}

/// All sixteen dimension weights. If this section is present in the file, every field must be
/// supplied explicitly (`deny_unknown_fields` plus the absence of per-field `#[serde(default)]`
/// would normally enforce this; we instead validate it at load time in [`crate::loader`] since
/// partial overrides of a scoring table silently change routing behavior).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimensionWeights {
    pub token_count: f32,
    pub code_presence: f32,
    pub reasoning_markers: f32,
    pub multi_step_patterns: f32,
    pub simple_indicators: f32,
    pub technical_terms: f32,
    pub agentic_task: f32,
    pub tool_presence: f32,
    pub question_complexity: f32,
    pub creative_markers: f32,
    pub constraint_count: f32,
    pub output_format: f32,
    pub conversation_depth: f32,
    pub imperative_verbs: f32,
    pub reference_complexity: f32,
    pub negation_complexity: f32,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            token_count: 1.0,
            code_presence: 1.0,
            reasoning_markers: 1.2,
            multi_step_patterns: 1.1,
            simple_indicators: 1.0,
            technical_terms: 0.9,
            agentic_task: 1.2,
            tool_presence: 1.0,
            question_complexity: 0.8,
            creative_markers: 0.7,
            constraint_count: 0.8,
            output_format: 0.6,
            conversation_depth: 0.6,
            imperative_verbs: 0.5,
            reference_complexity: 0.6,
            negation_complexity: 0.5,
        }
    }
}
