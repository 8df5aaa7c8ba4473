//! # Warden Screen - Content Risk Detectors
//!
//! The screening layer is the first line of defense in the Chat Warden
//! pipeline. It inspects every inbound message before it reaches the
//! downstream text generator, and every generated response before it is
//! returned to the client.
//!
//! ## Purpose
//!
//! This crate implements four stateless detector families:
//!
//! 1. **Normalizer** - Canonicalizes raw input (NFKC folding, zero-width
//!    stripping, injection-marker removal, bounded truncation) so that the
//!    other detectors see one consistent representation.
//!
//! 2. **Pattern Risk Scorer** - A data-driven table of weighted regex rules
//!    producing a 0-100 risk score, with an edit-distance fuzzy fallback for
//!    typo'd variants of known attack phrases.
//!
//! 3. **Obfuscation & Structure Analysis** - Independent boolean detectors
//!    for encoding tricks (homoglyphs, zero-width joiners, RTL overrides,
//!    entropy anomalies) and for suspicious message shape (payload
//!    delimiters, imperative density, stepwise framing).
//!
//! 4. **Canary Leak Detection** - Unique marker tokens sealed into the
//!    confidential instruction payload so that any disclosure of those
//!    instructions is independently detectable in user input or model output.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Direct injection | "Ignore previous instructions" attacks | Weighted rule table |
//! | Typo'd injection | Lightly mangled variants of known phrases | Fuzzy fallback |
//! | Homoglyph evasion | Look-alike Unicode substitution | NFKC + script mixing check |
//! | Hidden characters | Zero-width joiners, RTL overrides | Normalizer + obfuscation report |
//! | GCG-style suffixes | High-entropy adversarial gibberish | Shannon entropy check |
//! | Payload smuggling | Fenced blocks, multi-part framing | Structure analysis |
//! | Prompt extraction | System instruction disclosure | Canary tokens |
//!
//! ## Design Notes
//!
//! Every detector is a pure function over its input: no randomness, no
//! shared state, identical output for identical input. Stateful tracking
//! (per-identity behavior, rate limits) lives in sibling crates. All report
//! types derive Serde traits so the full decision trace can be serialized
//! for audit and dry-run inspection.
//!
//! ## References
//!
//! - **Zou et al. (2023)** - "Universal and Transferable Adversarial Attacks
//!   on Aligned Language Models" <https://arxiv.org/abs/2307.15043>
//! - **Perez & Ribeiro (2022)** - "Ignore This Title and HackAPrompt"
//!   <https://arxiv.org/abs/2311.16119>
//! - **Rebuff Framework** - Canary token injection for prompt leak detection.
//!   <https://github.com/protectai/rebuff>
//! - **OWASP LLM Top 10** - Taxonomy of LLM security risks.
//!   <https://owasp.org/www-project-top-10-for-large-language-model-applications/>

pub mod canary;
pub mod entropy;
pub mod models;
pub mod normalize;
pub mod obfuscation;
pub mod rules;
pub mod structure;

pub use canary::{check_leak, CanarySet};
pub use models::{
    CanaryReport, NormalizeStep, NormalizedInput, ObfuscationReport, ObfuscationTechnique,
    PatternReport, RuleMatch, ScreenError, StructureFactor, StructureReport,
};
pub use normalize::{normalize, DEFAULT_MAX_INPUT_CHARS};
pub use obfuscation::analyze;
pub use rules::{score, RiskRule, RuleSet};
pub use structure::analyze_structure;

/// Result type for screening operations.
pub type Result<T> = std::result::Result<T, ScreenError>;
