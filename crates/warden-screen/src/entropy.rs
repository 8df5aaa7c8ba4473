//! Shannon entropy analysis for gibberish payload detection.
//!
//! Gradient-optimized adversarial suffixes (GCG-style) read as
//! near-random character soup and carry markedly higher entropy than
//! natural language: English prose sits around 3.5-4.2 bits/char, random
//! ASCII above 6. A threshold check over the character frequency
//! distribution catches them cheaply.
//!
//! False-positive sources to keep in mind: base64 blobs, UUIDs, and dense
//! code snippets all run hot. Entropy is therefore one technique inside the
//! obfuscation report, never a block signal on its own.
//!
//! Reference: Zou et al. (2023), "Universal and Transferable Adversarial
//! Attacks on Aligned Language Models" <https://arxiv.org/abs/2307.15043>

use std::collections::HashMap;

/// Entropy threshold in bits per character above which text is flagged.
///
/// Chosen to sit above technical prose (~4.5) and below random character
/// sequences (~5.5+).
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 4.8;

/// Minimum length for a meaningful entropy estimate. Short strings do not
/// provide enough samples and are never flagged.
pub const MIN_ANALYSIS_LENGTH: usize = 20;

/// Shannon entropy of `text` in bits per character.
///
/// `H(X) = -sum(p(c) * log2(p(c)))` over the empirical character
/// distribution. Returns 0.0 for empty input.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        total += 1;
    }

    let total = total as f64;
    freq.values().fold(0.0, |h, &count| {
        let p = count as f64 / total;
        h - p * p.log2()
    })
}

/// True if `text` is long enough to analyze and its entropy exceeds
/// `threshold`.
pub fn is_high_entropy(text: &str, threshold: f64) -> bool {
    if text.chars().count() < MIN_ANALYSIS_LENGTH {
        return false;
    }
    shannon_entropy(text) > threshold
}
