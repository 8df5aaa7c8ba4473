//! # Risk Aggregator
//!
//! Folds the stateless detector reports and the behavioral drift signal
//! into one decision.
//!
//! ## Model
//!
//! Each signal is mapped into a 0-100 factor:
//!
//! | Factor | Source | Value |
//! |--------|--------|-------|
//! | pattern | rule table score | `min(100, score * pattern_gain)` |
//! | structure | structure analyzer | fixed penalty when suspicious |
//! | obfuscation | obfuscation analyzer | fixed penalty when any technique fired |
//! | drift | context tracker | `drift * drift_scaling` |
//! | canary | leak detector | maximal penalty when leaked |
//!
//! The composite is the mean of the NON-ZERO factors, amplified and capped
//! at 100. Averaging only fired factors keeps one strong signal from being
//! diluted by the silence of the other detectors, while corroboration
//! across several factors still raises the composite above any single
//! contribution.
//!
//! The decision is blocked when the composite crosses the block threshold,
//! when any single factor crosses the high-factor threshold, or
//! unconditionally on canary leakage. A passing request whose composite
//! crosses the lower delay threshold is flagged for slowed handling.

use serde::{Deserialize, Serialize};

use crate::config::ScreenConfig;
use warden_screen::{CanaryReport, ObfuscationReport, PatternReport, StructureReport};

/// The aggregated risk decision with its full factor breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    /// Rescaled pattern score.
    pub pattern_factor: f64,
    /// Structure penalty, 0 when the analyzer did not flag.
    pub structure_factor: f64,
    /// Obfuscation penalty, 0 when the analyzer did not flag.
    pub obfuscation_factor: f64,
    /// Scaled behavioral drift.
    pub drift_factor: f64,
    /// Canary penalty, 0 when nothing leaked.
    pub canary_factor: f64,
    /// Largest single factor.
    pub max_factor: f64,
    /// Amplified mean of the non-zero factors, capped at 100.
    pub composite: f64,
    /// The request must not reach the generator.
    pub block: bool,
    /// The request passes but is flagged for slowed handling.
    pub delay: bool,
}

/// Aggregate the detector reports into a decision.
pub fn decide(
    config: &ScreenConfig,
    pattern: &PatternReport,
    structure: &StructureReport,
    obfuscation: &ObfuscationReport,
    canary: &CanaryReport,
    drift: f64,
) -> RiskBreakdown {
    let pattern_factor = (pattern.score as f64 * config.pattern_gain).min(100.0);
    let structure_factor = if structure.suspicious_structure {
        config.structure_penalty
    } else {
        0.0
    };
    let obfuscation_factor = if obfuscation.has_obfuscation {
        config.obfuscation_penalty
    } else {
        0.0
    };
    let drift_factor = (drift * config.drift_scaling).min(100.0);
    let canary_factor = if canary.has_leakage {
        config.canary_penalty
    } else {
        0.0
    };

    let factors = [
        pattern_factor,
        structure_factor,
        obfuscation_factor,
        drift_factor,
        canary_factor,
    ];
    let max_factor = factors.iter().copied().fold(0.0f64, f64::max);

    let fired: Vec<f64> = factors.iter().copied().filter(|f| *f > 0.0).collect();
    let composite = if fired.is_empty() {
        0.0
    } else {
        let mean = fired.iter().sum::<f64>() / fired.len() as f64;
        (mean * config.amplification).min(100.0)
    };

    let block = composite > config.block_threshold
        || max_factor > config.high_factor_threshold
        || canary.has_leakage;
    let delay = !block && composite > config.delay_threshold;

    RiskBreakdown {
        pattern_factor,
        structure_factor,
        obfuscation_factor,
        drift_factor,
        canary_factor,
        max_factor,
        composite,
        block,
        delay,
    }
}
