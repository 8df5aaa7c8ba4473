//! # Input Normalizer
//!
//! Canonicalizes raw, untrusted text before any other detector sees it.
//!
//! ## Why normalize first
//!
//! Attackers routinely defeat pattern matching with look-alike Unicode
//! characters ("іgnore" with a Cyrillic і), invisible joiners between the
//! letters of a keyword, or template wrapper syntax copied from model chat
//! formats (`<|im_start|>`, `[INST]`). Folding all of that into one
//! canonical form means the rule table only has to describe the canonical
//! spelling of each attack.
//!
//! ## Pipeline
//!
//! Steps apply in a fixed order:
//!
//! 1. Unicode NFKC folding (compatibility decomposition + canonical
//!    composition) to collapse look-alike forms.
//! 2. Removal of zero-width and non-printing control characters. Newlines
//!    and tabs survive; the structure analyzer needs them.
//! 3. Blanking of injection-marker keywords and wrapper syntax. Matches are
//!    replaced with a single space rather than deleted, so that removing a
//!    wrapper can never concatenate two unrelated words into a new keyword.
//! 4. Whitespace trimming.
//! 5. Hard truncation at a configured maximum character count, with an
//!    ASCII truncation marker appended.
//!
//! The function is pure and idempotent: running it on its own output is a
//! no-op. Empty input short-circuits to an empty, unmodified result.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::models::{NormalizeStep, NormalizedInput};

/// Default maximum input length in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

/// Marker appended when input is truncated. ASCII only, so it survives NFKC
/// and every later pass unchanged.
const TRUNCATION_MARKER: &str = " [truncated]";

/// Wrapper syntax and injection-marker keywords that get blanked out.
///
/// Covers chat-template role tags, special-token wrappers, and HTML comment
/// delimiters. Fenced code blocks and horizontal rules are deliberately NOT
/// stripped here; the structure analyzer treats those as signal.
fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)
              <\|[a-z_]+\|>                    # <|im_start|>, <|endoftext|>
            | \[/?(?:INST|SYS|SYSTEM|ASSISTANT|USER)\]
            | <</?SYS>>
            | <!-- | -->
            | \#\#\#\s*(?:instruction|system|response)s?:?
            ",
        )
        .expect("marker regex is a compile-time constant")
    })
}

/// Zero-width and bidirectional formatting characters that hide or reorder
/// visible text. Each is invisible in most renderers.
fn is_zero_width_or_formatting(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{180E}'
            | '\u{200B}'
            | '\u{200C}'
            | '\u{200D}'
            | '\u{200E}'
            | '\u{200F}'
            | '\u{202A}'
            | '\u{202B}'
            | '\u{202C}'
            | '\u{202D}'
            | '\u{202E}'
            | '\u{2060}'
            | '\u{2066}'
            | '\u{2067}'
            | '\u{2068}'
            | '\u{2069}'
            | '\u{FEFF}'
    )
}

/// Control characters other than newline and tab are stripped as well.
fn is_stripped_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Normalize raw input into its canonical screened form.
///
/// Applies NFKC folding, zero-width/control stripping, marker blanking,
/// trimming, and truncation at `max_chars` (see [`DEFAULT_MAX_INPUT_CHARS`]).
///
/// Purely functional: no side effects beyond the returned value, and
/// `normalize(&normalize(x).text, n) == normalize(x, n)` for every input.
pub fn normalize(raw: &str, max_chars: usize) -> NormalizedInput {
    if raw.is_empty() {
        return NormalizedInput::empty();
    }

    let mut steps = Vec::new();

    // 1. NFKC compatibility folding.
    let folded: String = raw.nfkc().collect();
    if folded != raw {
        steps.push(NormalizeStep::NfkcFolded);
    }

    // 2. Strip zero-width/control characters.
    let mut stripped = String::with_capacity(folded.len());
    let mut removed = 0usize;
    for c in folded.chars() {
        if is_zero_width_or_formatting(c) || is_stripped_control(c) {
            removed += 1;
            continue;
        }
        stripped.push(c);
    }
    if removed > 0 {
        steps.push(NormalizeStep::ZeroWidthStripped);
    }

    // 3. Blank out injection markers. Replaced with a space, not deleted.
    let blanked = marker_regex().replace_all(&stripped, " ");
    if blanked != stripped {
        steps.push(NormalizeStep::MarkersStripped);
    }

    // 4. Trim.
    let trimmed = blanked.trim();
    if trimmed.len() != blanked.len() {
        steps.push(NormalizeStep::Trimmed);
    }

    // 5. Truncate. The marker counts toward the limit so a second pass sees
    // text at exactly `max_chars` and leaves it alone.
    let char_count = trimmed.chars().count();
    let text = if char_count > max_chars {
        steps.push(NormalizeStep::Truncated);
        let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
        let mut cut: String = trimmed.chars().take(keep).collect();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        trimmed.to_string()
    };

    NormalizedInput {
        was_modified: !steps.is_empty(),
        text,
        steps,
    }
}
