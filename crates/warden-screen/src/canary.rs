//! # Canary Tokens for Instruction Leak Detection
//!
//! Unique marker tokens are sealed into the confidential instruction
//! payload sent downstream. The tokens never appear in legitimate traffic,
//! so their presence in user input or model output is direct evidence that
//! the instructions leaked.
//!
//! ## How it works
//!
//! 1. **Sealing** - [`CanarySet::generate`] creates two tokens per
//!    pipeline instance; [`CanarySet::seal`] embeds one near the start and
//!    one near the end of the instruction payload. A leak of either half of
//!    the payload is then independently detectable.
//! 2. **Checking** - [`check_leak`] scans text for the full token values
//!    (confidence 1.0) and for long token segments appearing without the
//!    full value (confidence 0.8), which catches models that paraphrase or
//!    partially echo the leaked payload.
//!
//! Tokens derive from a nanosecond timestamp plus a UUIDv4 component, which
//! makes them practically unguessable (122 bits of UUID randomness alone).
//! Rotation is an explicit operation: regenerate the set and re-seal; it is
//! not done automatically.
//!
//! Inspired by the Rebuff framework's canary scheme
//! (<https://github.com/protectai/rebuff>).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::CanaryReport;

/// Prefix marking warden canary tokens. Short enough to stay below the
/// partial-match segment length, so the prefix alone never triggers a
/// false partial leak.
const CANARY_PREFIX: &str = "WDN";

/// Minimum segment length for a partial-leak match.
const MIN_SEGMENT_LEN: usize = 6;

/// Where in the sealed payload a token is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanaryPosition {
    /// Immediately before the instruction text.
    Preamble,
    /// Immediately after the instruction text.
    Epilogue,
}

/// One canary token and its structural position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryToken {
    pub value: String,
    pub position: CanaryPosition,
}

/// The active canary set for one pipeline instance.
///
/// Generated once at construction and owned by the pipeline; rotated only
/// by explicitly generating a new set and re-sealing the instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanarySet {
    tokens: Vec<CanaryToken>,
}

impl CanarySet {
    /// Generate a fresh set with one preamble and one epilogue token.
    pub fn generate() -> Self {
        Self {
            tokens: vec![
                CanaryToken {
                    value: generate_value(),
                    position: CanaryPosition::Preamble,
                },
                CanaryToken {
                    value: generate_value(),
                    position: CanaryPosition::Epilogue,
                },
            ],
        }
    }

    /// Seal `instructions` with this set's tokens at their positions.
    ///
    /// The markers are formatted as system-directive lines so they sit in
    /// the context window without disturbing the instruction content.
    pub fn seal(&self, instructions: &str) -> String {
        let mut out = String::with_capacity(instructions.len() + 128);
        for token in self.at(CanaryPosition::Preamble) {
            out.push_str(&format!("[{}:{}]\n", CANARY_PREFIX, token.value));
        }
        out.push_str(instructions);
        for token in self.at(CanaryPosition::Epilogue) {
            out.push_str(&format!("\n[{}:{}]", CANARY_PREFIX, token.value));
        }
        out
    }

    /// Iterate over all token values.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.value.as_str())
    }

    /// Tokens at a given position.
    fn at(&self, position: CanaryPosition) -> impl Iterator<Item = &CanaryToken> {
        self.tokens.iter().filter(move |t| t.position == position)
    }
}

/// A token value: prefix, nanosecond timestamp in hex, UUIDv4.
///
/// Example: `WDN-17f3a2b4c5d6e7f8-550e8400-e29b-41d4-a716-446655440000`
fn generate_value() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}-{:x}-{}", CANARY_PREFIX, nanos, Uuid::new_v4().as_hyphenated())
}

/// Check `text` for canary leakage against the active set.
///
/// Exact containment of any token value reports leakage at confidence 1.0.
/// Otherwise, any delimiter-separated segment of a token that is at least
/// [`MIN_SEGMENT_LEN`] characters and appears verbatim reports partial
/// leakage at confidence 0.8.
pub fn check_leak(text: &str, canaries: &CanarySet) -> CanaryReport {
    let mut exact_matches = Vec::new();
    let mut partial_matches = Vec::new();

    for value in canaries.values() {
        if text.contains(value) {
            exact_matches.push(value.to_string());
            continue;
        }
        for segment in value.split('-') {
            if segment.len() >= MIN_SEGMENT_LEN && text.contains(segment) {
                partial_matches.push(segment.to_string());
            }
        }
    }

    let confidence = if !exact_matches.is_empty() {
        1.0
    } else if !partial_matches.is_empty() {
        0.8
    } else {
        0.0
    };

    CanaryReport {
        has_leakage: confidence > 0.0,
        exact_matches,
        partial_matches,
        confidence,
    }
}
