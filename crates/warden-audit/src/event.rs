//! Security event records.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Maximum characters of user input carried into an event record.
///
/// The log stores enough context to understand a decision without
/// becoming a secondary archive of user content.
pub const EVENT_SNIPPET_CHARS: usize = 120;

/// What kind of security decision an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Input was rejected before analysis (e.g. empty after cleanup).
    InputRejected,
    /// The content pipeline blocked the request.
    ContentBlocked,
    /// The request passed but was flagged for slowed handling.
    ContentDelayed,
    /// A canary token surfaced in model output.
    CanaryLeak,
    /// The volumetric gate rejected the request.
    RateLimited,
    /// Repeated violations escalated to a timed ban.
    BanIssued,
    /// An operator lifted a ban early.
    BanLifted,
    /// An identity crossed the behavioral intervention threshold.
    Intervention,
}

/// One recorded security decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// When the decision was made.
    pub timestamp: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// The identity the decision applied to.
    pub identity: String,
    /// Leading snippet of the input that triggered the decision.
    pub truncated_input: String,
    /// Composite risk score at decision time, 0-100.
    pub risk_score: u8,
    /// Kind-specific detail (matched rules, ban expiry, retry hints).
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl SecurityEvent {
    /// Build an event, truncating `input` to [`EVENT_SNIPPET_CHARS`].
    pub fn new(kind: EventKind, identity: &str, input: &str, risk_score: u8) -> Self {
        Self {
            timestamp: SystemTime::now(),
            kind,
            identity: identity.to_string(),
            truncated_input: input.chars().take(EVENT_SNIPPET_CHARS).collect(),
            risk_score,
            extra: serde_json::Value::Null,
        }
    }

    /// Attach kind-specific detail.
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_truncated_to_snippet() {
        let long = "x".repeat(500);
        let event = SecurityEvent::new(EventKind::ContentBlocked, "alice", &long, 80);
        assert_eq!(event.truncated_input.chars().count(), EVENT_SNIPPET_CHARS);
    }

    #[test]
    fn test_short_input_kept_whole() {
        let event = SecurityEvent::new(EventKind::RateLimited, "bob", "hello", 0);
        assert_eq!(event.truncated_input, "hello");
    }

    #[test]
    fn test_serde_round_trip() {
        let event = SecurityEvent::new(EventKind::BanIssued, "carol", "bad input", 100)
            .with_extra(json!({"ban_secs": 1800}));
        let bytes = serde_json::to_vec(&event).unwrap();
        let back: SecurityEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let value = serde_json::to_value(EventKind::CanaryLeak).unwrap();
        assert_eq!(value, json!("canary_leak"));
    }
}
