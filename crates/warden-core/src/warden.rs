//! The unified warden facade.
//!
//! [`Warden`] owns every stateful component of the moderation pipeline and
//! exposes two entry points: [`Warden::screen`], the read-only trace used
//! by the admin dry-run surface, and [`Warden::handle`], the full path that
//! gates a message, brokers the downstream call, and scans the response.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    aggregate::decide,
    config::WardenConfig,
    decision::{empty_input_message, refusal_message, Outcome, Reply, Screening},
    upstream::{Turn, Upstream, UpstreamError},
    Result, WardenError,
};

use warden_audit::{EventKind, EventLog, SecurityEvent};
use warden_context::{ContextTracker, ThreatBand};
use warden_screen::{
    analyze, analyze_structure, check_leak, normalize, rules::score_with_fuzzy, CanaryReport,
    CanarySet, RuleSet,
};
use warden_throttle::{Admission, Throttle};

/// The active canary set and the instruction payload sealed with it. Both
/// are replaced together on rotation.
struct Sealed {
    canaries: CanarySet,
    instructions: String,
}

/// The moderation pipeline facade.
///
/// All state is explicit and injected at construction: the compiled rule
/// table, the canary set, the per-identity trackers, and the audit log.
/// There are no globals; two `Warden` instances are fully independent.
///
/// # Gate order
///
/// Per request: active ban first, then the rate window, then the content
/// pipeline. The cheap volumetric checks shield the expensive detectors.
///
/// # Concurrency
///
/// `handle` takes `&self` and is safe to call concurrently. No internal
/// lock is held across the downstream await: the sealed instructions are
/// cloned out before the call.
pub struct Warden {
    config: WardenConfig,
    rules: RuleSet,
    sealed: RwLock<Sealed>,
    tracker: ContextTracker,
    throttle: Throttle,
    audit: EventLog,
}

impl Warden {
    /// Build a warden from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the rule table does not compile or the audit store cannot
    /// be opened. Nothing else about construction is fallible.
    pub fn new(config: WardenConfig) -> Result<Self> {
        let rules = RuleSet::standard()?;
        let audit = EventLog::from_config(&config.audit)?;
        let canaries = CanarySet::generate();
        let instructions = canaries.seal(&config.global.system_instructions);
        let tracker = ContextTracker::new(config.context.clone());
        let throttle = Throttle::new(config.throttle.clone());

        info!(
            rules = rules.len(),
            block_threshold = config.screen.block_threshold,
            "warden initialized"
        );

        Ok(Self {
            config,
            rules,
            sealed: RwLock::new(Sealed {
                canaries,
                instructions,
            }),
            tracker,
            throttle,
            audit,
        })
    }

    /// Screen one message without side effects: no rate-window slot is
    /// consumed, no context update is recorded, nothing is logged. The
    /// behavioral assessment is the identity's current state, read as-is,
    /// and the rate window is peeked rather than counted.
    pub fn screen(&self, identity: &str, message: &str, history: &[Turn]) -> Screening {
        let normalized = normalize(message, self.config.screen.max_input_chars);
        let pattern = score_with_fuzzy(
            &normalized.text,
            &self.rules,
            self.config.screen.pattern_high_risk_threshold,
            self.config.screen.fuzzy_threshold,
        );
        let obfuscation = analyze(message);
        let structure = analyze_structure(&normalized.text);
        let canaries = self.current_canaries();
        let canary = self.scan_inbound(&normalized.text, history, &canaries);
        let context = self.tracker.assess(identity);
        let breakdown = decide(
            &self.config.screen,
            &pattern,
            &structure,
            &obfuscation,
            &canary,
            context.drift,
        );

        let outcome = if let Some(ban) = self.throttle.active_ban(identity) {
            Outcome::Banned {
                expires_at: ban.expires_at,
            }
        } else if let Some(retry_after) = self.throttle.would_rate_limit(identity) {
            Outcome::RateExceeded { retry_after }
        } else if normalized.text.is_empty() {
            Outcome::InputRejected
        } else if breakdown.block {
            Outcome::ContentBlocked
        } else if breakdown.delay {
            Outcome::Delayed
        } else {
            Outcome::Pass
        };

        Screening {
            identity: identity.to_string(),
            normalized,
            pattern,
            obfuscation,
            structure,
            canary,
            context,
            breakdown,
            outcome,
        }
    }

    /// The admin dry-run surface: [`screen`](Self::screen) gated by exact
    /// equality against the configured shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Unauthorized`] when the secret is wrong or no
    /// secret is configured.
    pub fn screen_admin(
        &self,
        secret: &str,
        identity: &str,
        message: &str,
        history: &[Turn],
    ) -> Result<Screening> {
        match &self.config.global.admin_secret {
            Some(expected) if expected == secret => Ok(self.screen(identity, message, history)),
            _ => Err(WardenError::Unauthorized),
        }
    }

    /// Handle one message end to end: gate it, screen it, broker the
    /// downstream call under a deadline, and scan the response for leakage.
    pub async fn handle(
        &self,
        identity: &str,
        message: &str,
        history: &[Turn],
        upstream: &dyn Upstream,
    ) -> Reply {
        match self.throttle.admit(identity) {
            Admission::Banned { expires_at } => {
                debug!(identity, "request rejected: active ban");
                return Reply::HardBlock { expires_at };
            }
            Admission::RateLimited { retry_after } => {
                self.record(
                    EventKind::RateLimited,
                    identity,
                    message,
                    0,
                    json!({ "retry_after_secs": retry_after.as_secs() }),
                );
                return Reply::RateLimited { retry_after };
            }
            Admission::Allowed => {}
        }

        let normalized = normalize(message, self.config.screen.max_input_chars);
        if normalized.text.is_empty() {
            self.record(
                EventKind::InputRejected,
                identity,
                message,
                0,
                serde_json::Value::Null,
            );
            return Reply::Refusal {
                message: empty_input_message().to_string(),
            };
        }

        let pattern = score_with_fuzzy(
            &normalized.text,
            &self.rules,
            self.config.screen.pattern_high_risk_threshold,
            self.config.screen.fuzzy_threshold,
        );
        let obfuscation = analyze(message);
        let structure = analyze_structure(&normalized.text);
        let (instructions, canaries) = {
            let sealed = self.sealed.read().unwrap_or_else(PoisonError::into_inner);
            (sealed.instructions.clone(), sealed.canaries.clone())
        };
        let canary = self.scan_inbound(&normalized.text, history, &canaries);

        let band = if pattern.is_high_risk || canary.has_leakage {
            ThreatBand::High
        } else if structure.suspicious_structure || obfuscation.has_obfuscation || pattern.score > 0
        {
            ThreatBand::Medium
        } else {
            ThreatBand::Normal
        };
        let assessment = self.tracker.update(identity, &normalized.text, band);
        if assessment.requires_intervention {
            self.record(
                EventKind::Intervention,
                identity,
                message,
                0,
                json!({
                    "confidence": assessment.confidence,
                    "anomaly_count": assessment.anomaly_count,
                }),
            );
        }

        let breakdown = decide(
            &self.config.screen,
            &pattern,
            &structure,
            &obfuscation,
            &canary,
            assessment.drift,
        );

        if breakdown.block {
            let score = breakdown.composite.round() as u8;
            self.record(
                EventKind::ContentBlocked,
                identity,
                message,
                score,
                json!({
                    "composite": breakdown.composite,
                    "max_factor": breakdown.max_factor,
                    "matched_rules": pattern
                        .matches
                        .iter()
                        .map(|m| m.description.as_str())
                        .collect::<Vec<_>>(),
                }),
            );
            if canary.has_leakage {
                self.record(
                    EventKind::CanaryLeak,
                    identity,
                    message,
                    score,
                    json!({ "confidence": canary.confidence }),
                );
            }
            self.punish(identity, message, score);
            return Reply::Refusal {
                message: refusal_message(breakdown.composite).to_string(),
            };
        }

        if breakdown.delay {
            self.record(
                EventKind::ContentDelayed,
                identity,
                message,
                breakdown.composite.round() as u8,
                json!({ "composite": breakdown.composite }),
            );
        }

        // Caller-supplied history gets the same normalization as the live
        // message before anything is forwarded.
        let clean_history: Vec<Turn> = history
            .iter()
            .map(|turn| Turn {
                role: turn.role,
                text: normalize(&turn.text, self.config.screen.max_input_chars).text,
            })
            .collect();

        let deadline = Duration::from_secs(self.config.global.downstream_timeout_secs);
        let sent = tokio::time::timeout(
            deadline,
            upstream.send(&instructions, &clean_history, &normalized.text),
        )
        .await;

        let response = match sent {
            Err(_) => {
                warn!(identity, "downstream call exceeded its deadline");
                return Reply::Timeout;
            }
            Ok(Err(UpstreamError::Timeout)) => {
                warn!(identity, "downstream reported a timeout");
                return Reply::Timeout;
            }
            Ok(Err(UpstreamError::Failed(detail))) => {
                // The detail stays in the log; callers get an opaque failure.
                warn!(identity, %detail, "downstream call failed");
                return Reply::Failure;
            }
            Ok(Ok(response)) => response,
        };

        let outbound = check_leak(&response, &canaries);
        if outbound.has_leakage {
            warn!(
                identity,
                confidence = outbound.confidence,
                "canary leaked in generated response, suppressing"
            );
            self.record(
                EventKind::CanaryLeak,
                identity,
                message,
                100,
                json!({
                    "direction": "outbound",
                    "confidence": outbound.confidence,
                }),
            );
            self.punish(identity, message, 100);
            return Reply::Refusal {
                message: refusal_message(100.0).to_string(),
            };
        }

        Reply::Answer { text: response }
    }

    /// Rotate the canary set and re-seal the instruction payload. In-flight
    /// requests keep checking against the set they cloned at entry.
    pub fn reseal(&self) {
        let canaries = CanarySet::generate();
        let instructions = canaries.seal(&self.config.global.system_instructions);
        let mut sealed = self.sealed.write().unwrap_or_else(PoisonError::into_inner);
        sealed.canaries = canaries;
        sealed.instructions = instructions;
        info!("canary set rotated");
    }

    /// Suspend an identity for `duration`, regardless of its violation
    /// history (operator action, the counterpart to
    /// [`pardon`](Self::pardon)).
    pub fn suspend(&self, identity: &str, duration: Duration) {
        let ban = self.throttle.suspend(identity, duration);
        self.record(
            EventKind::BanIssued,
            identity,
            "",
            0,
            json!({
                "reason": "manual_suspension",
                "expires_at": ban.expires_at,
            }),
        );
        info!(identity, expires_at = ?ban.expires_at, "identity suspended by operator");
    }

    /// Lift an identity's ban and reset its behavioral state (operator
    /// action, e.g. after a successful appeal).
    pub fn pardon(&self, identity: &str) {
        self.throttle.lift_ban(identity);
        self.tracker.forget(identity);
        self.record(
            EventKind::BanLifted,
            identity,
            "",
            0,
            serde_json::Value::Null,
        );
        info!(identity, "ban lifted and behavioral state reset");
    }

    /// The most recent security events, newest first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<SecurityEvent>> {
        Ok(self.audit.recent(limit)?)
    }

    fn current_canaries(&self) -> CanarySet {
        self.sealed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .canaries
            .clone()
    }

    /// Scan the live message and every history turn for canary leakage.
    /// The first leaking text wins; history is caller-controlled, so a
    /// leaked token smuggled into "prior conversation" counts the same as
    /// one in the message.
    fn scan_inbound(&self, message: &str, history: &[Turn], canaries: &CanarySet) -> CanaryReport {
        let report = check_leak(message, canaries);
        if report.has_leakage {
            return report;
        }
        for turn in history {
            let report = check_leak(&turn.text, canaries);
            if report.has_leakage {
                return report;
            }
        }
        report
    }

    /// One blocked decision is exactly one violation, regardless of how
    /// many detectors fired.
    fn punish(&self, identity: &str, message: &str, score: u8) {
        if let Some(ban) = self.throttle.record_violation(identity) {
            self.record(
                EventKind::BanIssued,
                identity,
                message,
                score,
                json!({ "expires_at": ban.expires_at }),
            );
        }
    }

    fn record(
        &self,
        kind: EventKind,
        identity: &str,
        input: &str,
        risk_score: u8,
        extra: serde_json::Value,
    ) {
        self.audit
            .record(&SecurityEvent::new(kind, identity, input, risk_score).with_extra(extra));
    }
}
