//! The per-identity context tracker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many recent inputs are retained per identity (FIFO, oldest evicted).
const RECENT_INPUT_CAP: usize = 5;

/// Recent inputs are stored truncated; full transcripts are not this
/// crate's business.
const RECENT_INPUT_SNIPPET: usize = 120;

/// Threat signal band for one input, classified upstream by the decision
/// engine from the stateless detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatBand {
    /// Strong threat signal (high-risk pattern match, canary leak).
    High,
    /// Moderate signal (suspicious structure, obfuscation, low pattern score).
    Medium,
    /// No meaningful signal.
    Normal,
}

/// Categorical projection of the current state. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyLabel {
    Normal,
    Elevated,
    High,
    Critical,
}

/// Tuning knobs for the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Idle gap that triggers the large trust-recovery step, in seconds.
    pub long_quiet_secs: u64,
    /// Idle gap that triggers the small trust-recovery step, in seconds.
    pub medium_quiet_secs: u64,
    /// Confidence floor below which intervention is required.
    pub intervention_confidence: f64,
    /// Anomaly count above which intervention is required.
    pub intervention_anomalies: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            long_quiet_secs: 600,
            medium_quiet_secs: 300,
            intervention_confidence: 0.4,
            intervention_anomalies: 3.0,
        }
    }
}

/// One retained input snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentInput {
    pub text: String,
    pub timestamp: SystemTime,
}

/// Long-lived behavioral state for one identity. Mutated in place under the
/// tracker's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextState {
    pub confidence: f64,
    pub drift: f64,
    pub anomaly_count: f64,
    pub recent_inputs: VecDeque<RecentInput>,
    pub last_update: SystemTime,
}

impl ContextState {
    fn fresh(now: SystemTime) -> Self {
        Self {
            confidence: 1.0,
            drift: 0.0,
            anomaly_count: 0.0,
            recent_inputs: VecDeque::with_capacity(RECENT_INPUT_CAP),
            last_update: now,
        }
    }

    fn clamp(&mut self) {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.drift = self.drift.clamp(0.0, 1.0);
        self.anomaly_count = self.anomaly_count.max(0.0);
    }

    fn label(&self) -> AnomalyLabel {
        if self.anomaly_count > 5.0 || self.drift > 0.8 {
            AnomalyLabel::Critical
        } else if self.anomaly_count > 3.0 || self.drift > 0.6 {
            AnomalyLabel::High
        } else if self.anomaly_count > 1.5 || self.drift > 0.35 {
            AnomalyLabel::Elevated
        } else {
            AnomalyLabel::Normal
        }
    }
}

/// Read-only view returned from every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextAssessment {
    pub confidence: f64,
    pub drift: f64,
    pub anomaly_count: f64,
    pub label: AnomalyLabel,
    pub requires_intervention: bool,
}

/// Tracks behavioral context for every identity.
///
/// The state map sits behind one mutex so each per-identity update is an
/// atomic read-modify-write: concurrent requests for the same identity
/// cannot under-count their own violations by interleaving. A poisoned
/// lock (a panicking request mid-update) is recovered rather than
/// propagated; screening continues from the last written state.
pub struct ContextTracker {
    config: ContextConfig,
    states: Mutex<HashMap<String, ContextState>>,
}

impl ContextTracker {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record `text` with its classified `band` for `identity`, using the
    /// current wall clock.
    pub fn update(&self, identity: &str, text: &str, band: ThreatBand) -> ContextAssessment {
        self.update_at(identity, text, band, SystemTime::now())
    }

    /// [`update`](Self::update) with an explicit clock, the seam the tests
    /// use to simulate idle periods.
    pub fn update_at(
        &self,
        identity: &str,
        text: &str,
        band: ThreatBand,
        now: SystemTime,
    ) -> ContextAssessment {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(identity.to_string())
            .or_insert_with(|| ContextState::fresh(now));

        state.recent_inputs.push_back(RecentInput {
            text: text.chars().take(RECENT_INPUT_SNIPPET).collect(),
            timestamp: now,
        });
        while state.recent_inputs.len() > RECENT_INPUT_CAP {
            state.recent_inputs.pop_front();
        }

        let elapsed = now
            .duration_since(state.last_update)
            .unwrap_or(Duration::ZERO);

        if elapsed.as_secs() >= self.config.long_quiet_secs {
            // Long quiet period: large trust recovery.
            state.confidence += 0.3;
            state.drift -= 0.3;
            state.anomaly_count -= 1.5;
        } else if elapsed.as_secs() >= self.config.medium_quiet_secs {
            state.confidence += 0.15;
            state.drift -= 0.15;
            state.anomaly_count -= 0.75;
        } else {
            match band {
                ThreatBand::High => {
                    state.anomaly_count += 1.0;
                    state.drift += 0.15;
                    state.confidence -= 0.2;
                }
                ThreatBand::Medium => {
                    state.anomaly_count += 0.4;
                    state.drift += 0.08;
                    state.confidence -= 0.1;
                }
                ThreatBand::Normal => {
                    state.anomaly_count -= 0.25;
                    state.drift -= 0.05;
                    state.confidence += 0.05;
                }
            }
        }

        state.clamp();
        state.last_update = now;

        let assessment = ContextAssessment {
            confidence: state.confidence,
            drift: state.drift,
            anomaly_count: state.anomaly_count,
            label: state.label(),
            requires_intervention: state.confidence < self.config.intervention_confidence
                || state.anomaly_count > self.config.intervention_anomalies,
        };

        if assessment.requires_intervention {
            debug!(
                identity,
                confidence = assessment.confidence,
                anomalies = assessment.anomaly_count,
                "identity context requires intervention"
            );
        }
        assessment
    }

    /// Current assessment for `identity` without recording anything. An
    /// unknown identity reads as fully trusted. This is the read-only view
    /// behind the dry-run surface.
    pub fn assess(&self, identity: &str) -> ContextAssessment {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        match states.get(identity) {
            Some(state) => ContextAssessment {
                confidence: state.confidence,
                drift: state.drift,
                anomaly_count: state.anomaly_count,
                label: state.label(),
                requires_intervention: state.confidence < self.config.intervention_confidence
                    || state.anomaly_count > self.config.intervention_anomalies,
            },
            None => ContextAssessment {
                confidence: 1.0,
                drift: 0.0,
                anomaly_count: 0.0,
                label: AnomalyLabel::Normal,
                requires_intervention: false,
            },
        }
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop state for one identity (operator action, e.g. after appeal).
    pub fn forget(&self, identity: &str) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }
}
