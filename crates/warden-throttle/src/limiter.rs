//! Rate limiting and the ban state machine.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{CounterStore, MemoryCounterStore};

/// Throttle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Rate window length in seconds.
    pub window_secs: u64,
    /// Maximum requests admitted per window. The `(max_requests + 1)`-th
    /// call inside one window is rejected.
    pub max_requests: u32,
    /// Rolling window for counting content violations, in seconds.
    pub restriction_window_secs: u64,
    /// Violations within the restriction window that trigger a ban.
    pub restriction_threshold: u32,
    /// Ban duration in seconds.
    pub ban_duration_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 10,
            restriction_window_secs: 900,
            restriction_threshold: 5,
            ban_duration_secs: 1800,
        }
    }
}

/// Why a ban was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BanReason {
    /// Content violations reached the restriction threshold.
    RepeatedContentViolations,
    /// Issued by an operator out of band.
    ManualSuspension,
}

/// A timed suspension for one identity. Owned exclusively by the throttle;
/// the decision engine only reads it as a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub reason: BanReason,
    pub issued_at: SystemTime,
    pub expires_at: SystemTime,
}

impl BanRecord {
    /// Lazy expiry check.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }
}

/// Outcome of the volumetric gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    /// Proceed to the content pipeline.
    Allowed,
    /// Too many requests this window; retry after the window remainder.
    RateLimited { retry_after: Duration },
    /// An active ban rejects the request before anything else runs.
    Banned { expires_at: SystemTime },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// The volumetric gate: fixed-window rate limiting plus ban escalation.
///
/// Gate priority per request: active ban first (highest), then the rate
/// window, then the caller proceeds to content analysis. Violations are
/// recorded separately by the decision engine for every content-blocked
/// request; one blocked request is exactly one violation.
pub struct Throttle {
    config: ThrottleConfig,
    store: Arc<dyn CounterStore>,
    violations: Mutex<HashMap<String, VecDeque<SystemTime>>>,
    bans: Mutex<HashMap<String, BanRecord>>,
}

impl Throttle {
    /// Throttle backed by the in-process counter store.
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryCounterStore::new()))
    }

    /// Throttle backed by a caller-provided counter store (e.g. a shared
    /// keyed store for multi-instance deployments).
    pub fn with_store(config: ThrottleConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            config,
            store,
            violations: Mutex::new(HashMap::new()),
            bans: Mutex::new(HashMap::new()),
        }
    }

    /// Gate one request using the current wall clock.
    pub fn admit(&self, identity: &str) -> Admission {
        self.admit_at(identity, SystemTime::now())
    }

    /// [`admit`](Self::admit) with an explicit clock.
    pub fn admit_at(&self, identity: &str, now: SystemTime) -> Admission {
        if let Some(ban) = self.active_ban_at(identity, now) {
            return Admission::Banned {
                expires_at: ban.expires_at,
            };
        }

        let window_len = Duration::from_secs(self.config.window_secs);
        let window = self.store.hit(identity, window_len, now);
        if window.count > self.config.max_requests {
            let elapsed = now
                .duration_since(window.window_start)
                .unwrap_or(Duration::ZERO);
            let retry_after = window_len.saturating_sub(elapsed);
            return Admission::RateLimited { retry_after };
        }

        Admission::Allowed
    }

    /// Whether the next request would be rejected by the rate window,
    /// without consuming a slot. Returns the retry hint it would carry.
    pub fn would_rate_limit(&self, identity: &str) -> Option<Duration> {
        self.would_rate_limit_at(identity, SystemTime::now())
    }

    /// [`would_rate_limit`](Self::would_rate_limit) with an explicit clock.
    pub fn would_rate_limit_at(&self, identity: &str, now: SystemTime) -> Option<Duration> {
        let window_len = Duration::from_secs(self.config.window_secs);
        let window = self.store.peek(identity, window_len, now)?;
        if window.count >= self.config.max_requests {
            let elapsed = now
                .duration_since(window.window_start)
                .unwrap_or(Duration::ZERO);
            Some(window_len.saturating_sub(elapsed))
        } else {
            None
        }
    }

    /// Record one content violation; returns the ban if this violation
    /// crossed the restriction threshold.
    pub fn record_violation(&self, identity: &str) -> Option<BanRecord> {
        self.record_violation_at(identity, SystemTime::now())
    }

    /// [`record_violation`](Self::record_violation) with an explicit clock.
    pub fn record_violation_at(&self, identity: &str, now: SystemTime) -> Option<BanRecord> {
        let restriction_window = Duration::from_secs(self.config.restriction_window_secs);
        let mut violations = self
            .violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let history = violations.entry(identity.to_string()).or_default();

        history.push_back(now);
        while let Some(&oldest) = history.front() {
            let age = now.duration_since(oldest).unwrap_or(Duration::ZERO);
            if age > restriction_window {
                history.pop_front();
            } else {
                break;
            }
        }

        if (history.len() as u32) < self.config.restriction_threshold {
            return None;
        }

        // Threshold reached: issue the ban and start the violation history
        // over, so a returning offender must re-earn the next ban.
        history.clear();
        let ban = BanRecord {
            reason: BanReason::RepeatedContentViolations,
            issued_at: now,
            expires_at: now + Duration::from_secs(self.config.ban_duration_secs),
        };
        warn!(identity, expires_at = ?ban.expires_at, "issuing ban after repeated violations");
        self.bans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string(), ban);
        Some(ban)
    }

    /// Suspend an identity out of band (operator action). Replaces any
    /// existing ban; the violation history is untouched.
    pub fn suspend(&self, identity: &str, duration: Duration) -> BanRecord {
        self.suspend_at(identity, duration, SystemTime::now())
    }

    /// [`suspend`](Self::suspend) with an explicit clock.
    pub fn suspend_at(&self, identity: &str, duration: Duration, now: SystemTime) -> BanRecord {
        let ban = BanRecord {
            reason: BanReason::ManualSuspension,
            issued_at: now,
            expires_at: now + duration,
        };
        info!(identity, expires_at = ?ban.expires_at, "manual suspension issued");
        self.bans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.to_string(), ban);
        ban
    }

    /// The identity's active ban, if any. Expired bans are removed here -
    /// expiry is lazy, checked on read.
    pub fn active_ban(&self, identity: &str) -> Option<BanRecord> {
        self.active_ban_at(identity, SystemTime::now())
    }

    fn active_ban_at(&self, identity: &str, now: SystemTime) -> Option<BanRecord> {
        let mut bans = self.bans.lock().unwrap_or_else(PoisonError::into_inner);
        match bans.get(identity) {
            Some(ban) if ban.is_expired(now) => {
                info!(identity, "ban expired, restoring access");
                bans.remove(identity);
                None
            }
            Some(ban) => Some(*ban),
            None => None,
        }
    }

    /// Lift a ban early (operator action).
    pub fn lift_ban(&self, identity: &str) {
        self.bans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }
}
