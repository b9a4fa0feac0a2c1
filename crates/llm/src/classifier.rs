//! Auto-routing classifier: a deterministic, synchronous function from a [`UnifiedRequest`] to a
//! complexity [`Tier`].
//!
//! The scoring tables themselves live in [`config::classifier`] since they are part of the
//! configuration file contract; this module only holds the scoring function.

use std::sync::OnceLock;

use config::classifier::{Boundaries, ClassifierConfig, Tier};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::unified::{ResponseFormat, ToolChoice, UnifiedRequest};

/// How a tier was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    ShortCircuit,
    Rules,
}

/// The full, inspectable result of classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub tier: Tier,
    pub score: f32,
    pub confidence: f32,
    pub method: Method,
    pub reasoning: String,
    pub signals: Vec<String>,
    pub agentic_score: f32,
    pub has_structured_output: bool,
}

struct Patterns {
    heartbeat: Regex,
    forced_tier: Regex,
    reasoning_markers: Regex,
    multi_step: Regex,
    simple_indicators: Regex,
    technical_terms: Regex,
    agentic: Regex,
    creative: Regex,
    architecture_noun: Regex,
    architecture_verb: Regex,
    imperative_verbs: Regex,
    negation: Regex,
    code_fence: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        heartbeat: Regex::new(r"(?i)^\s*(hi|hello|ping|hey|test|ok)\s*[.!?]*\s*$").unwrap(),
        forced_tier: Regex::new(r"(?i)\bUSE\s+(HEARTBEAT|SIMPLE|MEDIUM|COMPLEX|REASONING)\b").unwrap(),
        reasoning_markers: Regex::new(
            r"(?i)\b(prove|derive|theorem|step[- ]by[- ]step|reason through|think carefully|why does|explain the reasoning)\b",
        )
        .unwrap(),
        multi_step: Regex::new(r"(?i)\b(first|then|next|finally|after that|step \d)\b").unwrap(),
        simple_indicators: Regex::new(r"(?i)\b(what is|who is|when is|define|translate|spell)\b").unwrap(),
        technical_terms: Regex::new(
            r"(?i)\b(microservice|architecture|database|algorithm|api|schema|distributed|kubernetes|concurrency|protocol)\b",
        )
        .unwrap(),
        agentic: Regex::new(r"(?i)\b(agent|autonomous|multi[- ]step plan|orchestrate|execute a plan|use the tool)\b").unwrap(),
        creative: Regex::new(r"(?i)\b(write a (poem|story|song)|imagine|brainstorm|creative)\b").unwrap(),
        architecture_noun: Regex::new(r"(?i)\b(architecture|system design|microservices?|monolith)\b").unwrap(),
        architecture_verb: Regex::new(r"(?i)\b(design|compare|architect|refactor)\b").unwrap(),
        imperative_verbs: Regex::new(r"(?i)^\s*(write|create|build|generate|implement|fix|add|remove)\b").unwrap(),
        negation: Regex::new(r"(?i)\b(not|never|without|except|excluding)\b").unwrap(),
        code_fence: Regex::new(r"```|\bfn \w+\(|\bdef \w+\(|\bclass \w+\b").unwrap(),
    })
}

/// Four characters per token, over all textual content. Matches what the classifier actually
/// uses; provider-side accounting uses tiktoken-based counting instead.
fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32 / 4).max(1)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Classify a request. Pure, synchronous, and expected to run in well under a millisecond.
pub fn classify(request: &UnifiedRequest, config: &ClassifierConfig) -> Classification {
    let p = patterns();
    let last_user = request.last_user_text();
    let full_text = request.text_content();
    let token_estimate = estimate_tokens(&full_text);

    // Phase 1: short-circuits.
    if let Some(caps) = p.forced_tier.captures(&last_user) {
        let tier = match caps[1].to_ascii_uppercase().as_str() {
            "HEARTBEAT" => Tier::Heartbeat,
            "SIMPLE" => Tier::Simple,
            "MEDIUM" => Tier::Medium,
            "COMPLEX" => Tier::Complex,
            "REASONING" => Tier::Reasoning,
            _ => Tier::Medium,
        };
        return Classification {
            tier,
            score: 0.0,
            confidence: 1.0,
            method: Method::ShortCircuit,
            reasoning: "forced tier directive in last user message".into(),
            signals: vec!["forced-tier".into()],
            agentic_score: 0.0,
            has_structured_output: !matches!(request.response_format, ResponseFormat::FreeText),
        };
    }

    if token_estimate > config.max_tokens_force_complex {
        return Classification {
            tier: Tier::Complex,
            score: 0.0,
            confidence: 1.0,
            method: Method::ShortCircuit,
            reasoning: format!("estimated {token_estimate} tokens exceeds overflow threshold"),
            signals: vec!["token-overflow".into()],
            agentic_score: 0.0,
            has_structured_output: !matches!(request.response_format, ResponseFormat::FreeText),
        };
    }

    if p.heartbeat.is_match(&last_user) && request.tools.is_empty() && request.messages.len() <= 2 {
        return Classification {
            tier: Tier::Heartbeat,
            score: 0.0,
            confidence: 1.0,
            method: Method::ShortCircuit,
            reasoning: "matched heartbeat pattern with no tools and shallow conversation".into(),
            signals: vec!["heartbeat:pattern".into()],
            agentic_score: 0.0,
            has_structured_output: false,
        };
    }

    // Phase 2: dimension scoring.
    let w = &config.dimension_weights;
    let mut score = 0.0f32;
    let mut signals = Vec::new();
    let mut agentic_score = 0.0f32;

    let token_score = match token_estimate {
        0..=20 => -0.3,
        21..=80 => 0.0,
        81..=300 => 0.3,
        301..=1000 => 0.6,
        _ => 1.0,
    };
    score += token_score * w.token_count;

    if p.code_fence.is_match(&full_text) {
        score += 0.8 * w.code_presence;
        signals.push("code:present".to_string());
    }

    let reasoning_matches = p.reasoning_markers.find_iter(&last_user).count() as u32;
    if reasoning_matches > 0 {
        score += 1.0 * w.reasoning_markers;
        signals.push("reasoning:markers".to_string());
    }

    if p.multi_step.find_iter(&last_user).count() >= 2 {
        score += 0.8 * w.multi_step_patterns;
        signals.push("multi-step:pattern".to_string());
    }

    if p.simple_indicators.is_match(&last_user) {
        score -= 0.6 * w.simple_indicators;
        signals.push("simple:indicator".to_string());
    }

    let technical_hits = p.technical_terms.find_iter(&last_user).count();
    if technical_hits > 0 {
        score += (0.3 * technical_hits as f32).min(1.0) * w.technical_terms;
        signals.push("technical:terms".to_string());
    }

    if p.agentic.is_match(&last_user) {
        score += 0.8 * w.agentic_task;
        agentic_score += 0.6;
        signals.push("agentic:task".to_string());
    }

    let tool_choice_explicit = !matches!(request.tool_choice, ToolChoice::Auto);
    if !request.tools.is_empty() {
        score += 0.4 * w.tool_presence;
        agentic_score += 0.3;
        signals.push("tool:present".to_string());
        if tool_choice_explicit {
            score += 0.2 * w.tool_presence;
            agentic_score += 0.2;
        }
    }

    let question_marks = last_user.matches('?').count();
    if question_marks > 1 {
        score += 0.3 * w.question_complexity;
    }

    if p.creative.is_match(&last_user) {
        score += 0.3 * w.creative_markers;
        signals.push("creative:marker".to_string());
    }

    let constraint_count = last_user.matches(" must ").count() + last_user.matches(" should ").count();
    if constraint_count > 0 {
        score += (0.2 * constraint_count as f32).min(0.6) * w.constraint_count;
    }

    let has_structured_output = !matches!(request.response_format, ResponseFormat::FreeText);
    if has_structured_output {
        score += 0.3 * w.output_format;
        signals.push("output:structured".to_string());
    }

    let depth_score = match request.messages.len() {
        0..=2 => 0.0,
        3..=6 => 0.2,
        7..=12 => 0.4,
        _ => 0.6,
    };
    score += depth_score * w.conversation_depth;

    if p.imperative_verbs.is_match(&last_user) {
        score += 0.2 * w.imperative_verbs;
    }

    let reference_markers = last_user.matches("the above").count() + last_user.matches("previous").count();
    if reference_markers > 0 {
        score += 0.2 * w.reference_complexity;
    }

    if p.negation.find_iter(&last_user).count() >= 2 {
        score += 0.2 * w.negation_complexity;
    }

    // Phase 3: overrides.
    let mut tier = boundary_tier(score, &config.boundaries);

    if reasoning_matches >= config.reasoning_override_min_matches
        && tier >= Tier::Medium
        && score >= config.reasoning_override_min_score
    {
        tier = Tier::Reasoning;
        signals.push("override:reasoning".to_string());
    } else if p.architecture_noun.is_match(&last_user)
        && p.architecture_verb.is_match(&last_user)
        && tier >= Tier::Medium
        && score >= config.boundaries.medium_complex
    {
        tier = Tier::Complex;
        signals.push("override:architecture".to_string());
    }

    // Phase 4/5: boundary distance, confidence, ambiguity.
    let distance = distance_from_boundary(score, &config.boundaries);
    let mut confidence = sigmoid(config.confidence_steepness * distance);
    if confidence < config.ambiguity_threshold {
        tier = config.ambiguous_default_tier;
        confidence = config.ambiguity_threshold;
    }

    Classification {
        tier,
        score,
        confidence,
        method: Method::Rules,
        reasoning: format!("weighted score {score:.2} classified via rule dimensions"),
        signals,
        agentic_score,
        has_structured_output,
    }
}

fn boundary_tier(score: f32, boundaries: &Boundaries) -> Tier {
    if score < boundaries.simple_medium {
        Tier::Simple
    } else if score < boundaries.medium_complex {
        Tier::Medium
    } else if score < boundaries.complex_reasoning {
        Tier::Complex
    } else {
        Tier::Reasoning
    }
}

fn distance_from_boundary(score: f32, boundaries: &Boundaries) -> f32 {
    let cuts = [boundaries.simple_medium, boundaries.medium_complex, boundaries.complex_reasoning];
    cuts.iter().map(|c| (score - c).abs()).fold(f32::MAX, f32::min)
}

/// Apply the post-classification agentic boost: promotes one tier if `agentic_score` exceeds
/// the threshold, capped at REASONING.
pub fn apply_agentic_boost(classification: &mut Classification, threshold: f32) {
    if classification.agentic_score > threshold && classification.tier != Tier::Heartbeat {
        classification.tier = classification.tier.promote();
        classification.signals.push("boost:agentic".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unified::{Dialect, Message};
    use uuid::Uuid;

    fn request_with(text: &str) -> UnifiedRequest {
        UnifiedRequest {
            model: "auto".into(),
            messages: vec![Message::User {
                content: vec![crate::unified::ContentPart::Text { text: text.into() }],
            }],
            tools: vec![],
            tool_choice: ToolChoice::Auto,
            response_format: ResponseFormat::FreeText,
            sampling: Default::default(),
            stream: false,
            incoming_dialect: Dialect::OpenaiChat,
            request_id: Uuid::nil(),
        }
    }

    #[test]
    fn heartbeat_short_circuit() {
        let config = ClassifierConfig::default();
        let result = classify(&request_with("hi"), &config);
        assert_eq!(result.tier, Tier::Heartbeat);
        assert_eq!(result.method, Method::ShortCircuit);
        assert!(result.signals.iter().any(|s| s == "heartbeat:pattern"));
    }

    #[test]
    fn simple_question() {
        let config = ClassifierConfig::default();
        let result = classify(&request_with("what is the capital of France?"), &config);
        assert_eq!(result.tier, Tier::Simple);
        assert!(!result.has_structured_output);
    }

    #[test]
    fn forced_reasoning() {
        let config = ClassifierConfig::default();
        let result = classify(&request_with("Please USE REASONING."), &config);
        assert_eq!(result.tier, Tier::Reasoning);
        assert_eq!(result.method, Method::ShortCircuit);
    }

    #[test]
    fn multi_step_architecture_is_complex() {
        let config = ClassifierConfig::default();
        let text = "First list the requirements; then design a microservices architecture; \
                     finally compare with a monolith.";
        let result = classify(&request_with(text), &config);
        assert_eq!(result.tier, Tier::Complex);
    }

    #[test]
    fn structured_output_flag() {
        let config = ClassifierConfig::default();
        let mut request = request_with("Return the result as JSON");
        request.response_format = ResponseFormat::JsonObject;
        let result = classify(&request, &config);
        assert!(result.has_structured_output);
        assert!(result.tier >= Tier::Simple);
    }

    #[test]
    fn token_overflow_forces_complex() {
        let config = ClassifierConfig::default();
        let huge = "a".repeat((config.max_tokens_force_complex as usize + 1) * 4);
        let result = classify(&request_with(&huge), &config);
        assert_eq!(result.tier, Tier::Complex);
        assert!(result.signals.iter().any(|s| s == "token-overflow"));
    }

    #[test]
    fn agentic_boost_promotes_one_tier() {
        let mut classification = Classification {
            tier: Tier::Simple,
            score: 0.0,
            confidence: 1.0,
            method: Method::Rules,
            reasoning: String::new(),
            signals: vec![],
            agentic_score: 0.9,
            has_structured_output: false,
        };
        apply_agentic_boost(&mut classification, 0.8);
        assert_eq!(classification.tier, Tier::Medium);
    }
}
