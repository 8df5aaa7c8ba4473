//! # Structure Analyzer
//!
//! Flags message SHAPES typical of injection payloads, independent of
//! vocabulary-level pattern matching: a polite question and a staged
//! multi-part instruction block may share no keywords, but they do not
//! share a silhouette.
//!
//! Five factor categories are checked independently. A single factor is
//! treated as noise, not signal; ordinary requests trip one factor all the
//! time ("First, could you..."). Suspicion requires at least two distinct
//! categories co-occurring.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{StructureFactor, StructureReport};

/// Points per fired factor; score caps at 100.
const POINTS_PER_FACTOR: u8 = 20;

/// Minimum ratio of imperative sentences for the density factor, applied
/// only when the message has at least [`MIN_SENTENCES`] sentences.
const IMPERATIVE_RATIO: f64 = 0.5;
const MIN_SENTENCES: usize = 3;

/// Phrases that frame a new instruction regime. Checked against the opening
/// of the message only; mid-text occurrences are too noisy.
const PREAMBLE_TRIGGERS: &[&str] = &[
    "before we begin",
    "before you respond",
    "from now on",
    "for the rest of this conversation",
    "new instructions",
    "important update",
    "attention:",
    "your real task",
    "first, understand that",
];

/// Verbs that open an imperative sentence.
const IMPERATIVE_VERBS: &[&str] = &[
    "ignore", "disregard", "forget", "write", "tell", "show", "pretend", "act", "repeat",
    "output", "print", "reveal", "respond", "answer", "translate", "decode", "execute", "say",
    "begin", "stop", "always", "never",
];

/// Technical-system vocabulary; two or more distinct hits fire the factor.
const TECHNICAL_TERMS: &[&str] = &[
    "system prompt",
    "instruction set",
    "context window",
    "api key",
    "token limit",
    "sandbox",
    "developer mode",
    "guardrail",
    "model weights",
    "safety filter",
    "fine-tun",
    "jailbreak",
];

fn stepwise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:step\s+\d|\d+\s*[.):])").expect("stepwise regex is constant")
    })
}

fn horizontal_rule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:-{3,}|\*{3,}|={3,})\s*$").expect("hr regex is constant"))
}

/// Analyze normalized text for suspicious structure.
pub fn analyze_structure(text: &str) -> StructureReport {
    let lowered = text.to_lowercase();
    let mut factors = Vec::new();

    if has_preamble(&lowered) {
        factors.push(StructureFactor::Preamble);
    }
    if has_imperative_density(&lowered) {
        factors.push(StructureFactor::ImperativeDensity);
    }
    if has_payload_delimiters(text) {
        factors.push(StructureFactor::PayloadDelimiters);
    }
    if has_stepwise_framing(text) {
        factors.push(StructureFactor::StepwiseFraming);
    }
    if has_technical_vocabulary(&lowered) {
        factors.push(StructureFactor::TechnicalVocabulary);
    }

    let score = (factors.len() as u8).saturating_mul(POINTS_PER_FACTOR).min(100);
    StructureReport {
        suspicious_structure: factors.len() >= 2,
        score,
        factors,
    }
}

fn has_preamble(lowered: &str) -> bool {
    let opening: String = lowered.chars().take(160).collect();
    PREAMBLE_TRIGGERS.iter().any(|t| opening.contains(t))
}

fn has_imperative_density(lowered: &str) -> bool {
    let sentences: Vec<&str> = lowered
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.len() < MIN_SENTENCES {
        return false;
    }
    let imperative = sentences
        .iter()
        .filter(|s| {
            s.split_whitespace()
                .next()
                .map(|first| IMPERATIVE_VERBS.contains(&first))
                .unwrap_or(false)
        })
        .count();
    imperative as f64 / sentences.len() as f64 >= IMPERATIVE_RATIO
}

fn has_payload_delimiters(text: &str) -> bool {
    if text.contains("```") {
        return true;
    }
    if horizontal_rule_regex().is_match(text) {
        return true;
    }
    // Two or more blank-line breaks means distinct payload blocks.
    text.matches("\n\n").count() >= 2
}

fn has_stepwise_framing(text: &str) -> bool {
    stepwise_regex().find_iter(text).count() >= 2
}

fn has_technical_vocabulary(lowered: &str) -> bool {
    TECHNICAL_TERMS.iter().filter(|t| lowered.contains(*t)).count() >= 2
}
