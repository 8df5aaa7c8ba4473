//! Report and error types shared by the screening detectors.
//!
//! Each detector produces a fixed-shape, serializable report. The aggregator
//! in `warden-core` accepts these records as a tuple; it never inspects
//! loosely-typed fields. All reports are immutable once produced.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single normalization step that was applied to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeStep {
    /// Unicode NFKC folding changed at least one character.
    NfkcFolded,
    /// Zero-width or non-printing control characters were removed.
    ZeroWidthStripped,
    /// Injection-marker keywords or wrapper syntax were blanked out.
    MarkersStripped,
    /// Leading/trailing whitespace was trimmed.
    Trimmed,
    /// Input exceeded the maximum length and was cut.
    Truncated,
}

/// Canonicalized input produced by [`crate::normalize`].
///
/// Exists only for the duration of one request. `text` is what the
/// downstream detectors (and eventually the generator) see; the raw bytes
/// are never forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInput {
    /// The canonical text.
    pub text: String,
    /// True if any step changed the input.
    pub was_modified: bool,
    /// Which steps fired, in application order.
    pub steps: Vec<NormalizeStep>,
}

impl NormalizedInput {
    /// An empty, unmodified result (the short-circuit for empty input).
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            was_modified: false,
            steps: Vec::new(),
        }
    }
}

/// One matched risk rule, reported in rule-table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Human-readable description of the rule.
    pub description: String,
    /// The rule's weight (0-10).
    pub weight: u8,
}

/// Output of the pattern risk scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    /// Normalized risk score, 0-100.
    pub score: u8,
    /// Rules that matched, in table order.
    pub matches: Vec<RuleMatch>,
    /// Exactly `score >= threshold`.
    pub is_high_risk: bool,
    /// Bonus contributed by the fuzzy fallback (0 when a literal rule matched).
    pub fuzzy_bonus: u8,
}

/// An encoding or formatting trick detected in the raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObfuscationTechnique {
    /// Latin and Cyrillic/Greek codepoints mixed inside one word.
    MixedScript,
    /// Zero-width joiners or other invisible formatting characters.
    ZeroWidth,
    /// Right-to-left override marks.
    RtlOverride,
    /// Abnormally long whitespace runs or unusual space characters.
    WhitespaceRun,
    /// A single character repeated excessively.
    CharRepetition,
    /// Unusually high symbol-to-letter density.
    SymbolDensity,
    /// Shannon entropy above the gibberish threshold.
    HighEntropy,
}

/// Output of the obfuscation analyzer. The detectors are independent;
/// `has_obfuscation` is true if any fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscationReport {
    pub has_obfuscation: bool,
    /// Techniques that fired, in a fixed canonical order.
    pub techniques: Vec<ObfuscationTechnique>,
}

/// A structural factor category. Single-factor matches are treated as noise;
/// suspicion requires at least two distinct categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureFactor {
    /// Introductory "preamble" phrasing that frames a new instruction set.
    Preamble,
    /// Density of imperative/instructional sentences above the ratio threshold.
    ImperativeDensity,
    /// Payload-like delimiters: fenced blocks, horizontal rules, blank-line blocks.
    PayloadDelimiters,
    /// Multi-part or stepwise framing ("step 1 ... step 2 ...").
    StepwiseFraming,
    /// Technical-system vocabulary clusters.
    TechnicalVocabulary,
}

/// Output of the structure analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    /// True only when at least two factor categories co-occur.
    pub suspicious_structure: bool,
    /// 20 points per fired factor, capped at 100.
    pub score: u8,
    /// Factors that fired, in canonical order.
    pub factors: Vec<StructureFactor>,
}

/// Output of the canary leak check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanaryReport {
    pub has_leakage: bool,
    /// Full canary values found verbatim.
    pub exact_matches: Vec<String>,
    /// Canary segments found without the full value.
    pub partial_matches: Vec<String>,
    /// 1.0 for exact leakage, 0.8 for partial, 0.0 otherwise.
    pub confidence: f64,
}

impl CanaryReport {
    /// A clean report: nothing leaked.
    pub fn clean() -> Self {
        Self {
            has_leakage: false,
            exact_matches: Vec::new(),
            partial_matches: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Errors raised while loading screening configuration.
///
/// All detectors are total functions at request time; the only fallible step
/// is compiling the rule table, which happens once at startup.
#[derive(Debug, Error)]
pub enum ScreenError {
    /// A risk rule's pattern failed to compile.
    #[error("invalid risk rule '{description}': {source}")]
    BadRule {
        /// The rule's description, for operator diagnostics.
        description: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A rule weight was outside the 0-10 range.
    #[error("rule '{description}' has weight {weight}, expected 0-10")]
    BadWeight { description: String, weight: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_normalized_input() {
        let empty = NormalizedInput::empty();
        assert!(empty.text.is_empty());
        assert!(!empty.was_modified);
        assert!(empty.steps.is_empty());
    }

    #[test]
    fn test_clean_canary_report() {
        let report = CanaryReport::clean();
        assert!(!report.has_leakage);
        assert_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_report_serialization_round_trip() {
        let report = StructureReport {
            suspicious_structure: true,
            score: 40,
            factors: vec![StructureFactor::Preamble, StructureFactor::StepwiseFraming],
        };
        let json = serde_json::to_string(&report).unwrap();
        let parsed: StructureReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
