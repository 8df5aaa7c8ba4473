//! # Obfuscation Analyzer
//!
//! Independent boolean detectors for encoding and formatting tricks.
//!
//! The analyzer runs over the RAW input, before normalization: the
//! normalizer deliberately erases the very artifacts (zero-width joiners,
//! RTL overrides, look-alike scripts) that this module reports. Having both
//! views means the pipeline can match patterns on clean text while still
//! charging the sender for trying to hide something.
//!
//! Each detector is independent; [`analyze`] returns every technique that
//! fired and `has_obfuscation` is true if any did.

use crate::entropy::{self, DEFAULT_ENTROPY_THRESHOLD};
use crate::models::{ObfuscationReport, ObfuscationTechnique};

/// Consecutive identical characters at or above this run length count as
/// excessive repetition.
const REPETITION_RUN: usize = 10;

/// Consecutive whitespace characters at or above this run length count as
/// abnormal (padding/alignment tricks).
const WHITESPACE_RUN: usize = 12;

/// Symbol-to-character ratio above which density is flagged, over inputs
/// with at least [`DENSITY_MIN_CHARS`] non-whitespace characters.
const DENSITY_RATIO: f64 = 0.45;
const DENSITY_MIN_CHARS: usize = 24;

/// Analyze raw text for obfuscation techniques.
pub fn analyze(text: &str) -> ObfuscationReport {
    let mut techniques = Vec::new();

    if has_mixed_script(text) {
        techniques.push(ObfuscationTechnique::MixedScript);
    }
    if text.chars().any(is_zero_width) {
        techniques.push(ObfuscationTechnique::ZeroWidth);
    }
    if text.chars().any(is_rtl_override) {
        techniques.push(ObfuscationTechnique::RtlOverride);
    }
    if has_whitespace_run(text) {
        techniques.push(ObfuscationTechnique::WhitespaceRun);
    }
    if has_char_repetition(text) {
        techniques.push(ObfuscationTechnique::CharRepetition);
    }
    if has_symbol_density(text) {
        techniques.push(ObfuscationTechnique::SymbolDensity);
    }
    if entropy::is_high_entropy(text, DEFAULT_ENTROPY_THRESHOLD) {
        techniques.push(ObfuscationTechnique::HighEntropy);
    }

    ObfuscationReport {
        has_obfuscation: !techniques.is_empty(),
        techniques,
    }
}

/// Latin letters mixed with Cyrillic or Greek inside a single word is the
/// classic look-alike substitution signature ("pаypal" with a Cyrillic а).
/// Whole words in another script are ordinary multilingual text and pass.
fn has_mixed_script(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        let mut latin = false;
        let mut confusable = false;
        for c in word.chars() {
            if c.is_ascii_alphabetic() {
                latin = true;
            } else if matches!(c, '\u{0370}'..='\u{03FF}' | '\u{0400}'..='\u{04FF}') {
                confusable = true;
            }
        }
        latin && confusable
    })
}

fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

fn is_rtl_override(c: char) -> bool {
    matches!(
        c,
        '\u{200F}' | '\u{202B}' | '\u{202E}' | '\u{2067}'
    )
}

fn has_whitespace_run(text: &str) -> bool {
    let mut run = 0usize;
    for c in text.chars() {
        if c.is_whitespace() && c != '\n' {
            run += 1;
            if run >= WHITESPACE_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    // Unusual space codepoints count regardless of run length.
    text.chars()
        .any(|c| matches!(c, '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{3000}'))
}

fn has_char_repetition(text: &str) -> bool {
    let mut run = 0usize;
    let mut last: Option<char> = None;
    for c in text.chars() {
        if c.is_whitespace() {
            run = 0;
            last = None;
            continue;
        }
        if Some(c) == last {
            run += 1;
            if run + 1 >= REPETITION_RUN {
                return true;
            }
        } else {
            run = 0;
            last = Some(c);
        }
    }
    false
}

fn has_symbol_density(text: &str) -> bool {
    let mut symbols = 0usize;
    let mut total = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if !c.is_alphanumeric() {
            symbols += 1;
        }
    }
    total >= DENSITY_MIN_CHARS && symbols as f64 / total as f64 > DENSITY_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_clean() {
        let report = analyze("Could you summarize this article for me, please?");
        assert!(!report.has_obfuscation);
        assert!(report.techniques.is_empty());
    }

    #[test]
    fn test_mixed_script_fires() {
        // "іgnore" with a Cyrillic і inside a Latin word.
        let report = analyze("please \u{0456}gnore the rules");
        assert!(report.techniques.contains(&ObfuscationTechnique::MixedScript));
    }

    #[test]
    fn test_whole_foreign_word_passes() {
        let report = analyze("привет, how are you?");
        assert!(!report.techniques.contains(&ObfuscationTechnique::MixedScript));
    }

    #[test]
    fn test_zero_width_fires() {
        let report = analyze("ig\u{200B}nore this");
        assert!(report.has_obfuscation);
        assert!(report.techniques.contains(&ObfuscationTechnique::ZeroWidth));
    }

    #[test]
    fn test_rtl_override_fires() {
        let report = analyze("readable \u{202E}txet nedd\u{202C}ih");
        assert!(report.techniques.contains(&ObfuscationTechnique::RtlOverride));
    }

    #[test]
    fn test_whitespace_run_fires() {
        let report = analyze("hidden                      payload");
        assert!(report.techniques.contains(&ObfuscationTechnique::WhitespaceRun));
    }

    #[test]
    fn test_char_repetition_fires() {
        let report = analyze("loooooooooooooooong stretch");
        assert!(report.techniques.contains(&ObfuscationTechnique::CharRepetition));
    }

    #[test]
    fn test_symbol_density_fires() {
        let report = analyze("}{][)(*&^%$#@!~`+=|\\<>?/;:}{][)(*&");
        assert!(report.techniques.contains(&ObfuscationTechnique::SymbolDensity));
    }

    #[test]
    fn test_ordinary_punctuation_passes() {
        let report = analyze("Wait -- really? That's great news! (I think.)");
        assert!(!report.techniques.contains(&ObfuscationTechnique::SymbolDensity));
    }

    #[test]
    fn test_multiple_techniques_accumulate() {
        let report = analyze("x\u{200B}x\u{202E} aaaaaaaaaaaaaaa");
        assert!(report.techniques.len() >= 3);
        assert!(report.has_obfuscation);
    }
}
