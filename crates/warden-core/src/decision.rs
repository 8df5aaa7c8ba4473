//! Decision outputs: the screening trace and the caller-facing reply.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::aggregate::RiskBreakdown;
use warden_context::ContextAssessment;
use warden_screen::{
    CanaryReport, NormalizedInput, ObfuscationReport, PatternReport, StructureReport,
};

/// What the pipeline decided for one request.
///
/// For transports that speak HTTP, the intended mapping is: `Pass` and
/// `Delayed` forward downstream (200), `InputRejected` and `ContentBlocked`
/// return an in-character refusal (200), `Banned` is 403 with the expiry
/// hint, `RateExceeded` is 429 with retry-after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Clean; forward to the generator.
    Pass,
    /// Forward, but flagged for slowed handling.
    Delayed,
    /// Nothing usable left after normalization.
    InputRejected,
    /// The content pipeline blocked the request.
    ContentBlocked,
    /// The rate window is exhausted.
    RateExceeded { retry_after: Duration },
    /// The identity is under an active ban.
    Banned { expires_at: SystemTime },
}

impl Outcome {
    /// True if the request may reach the generator.
    pub fn proceeds(&self) -> bool {
        matches!(self, Outcome::Pass | Outcome::Delayed)
    }
}

/// The full intermediate trace for one screened message.
///
/// Everything the pipeline computed, in order: the canonical input, every
/// detector report, the behavioral assessment, the factor breakdown, and
/// the outcome. Serializable end to end; this is what the admin dry-run
/// surface returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screening {
    pub identity: String,
    pub normalized: NormalizedInput,
    pub pattern: PatternReport,
    pub obfuscation: ObfuscationReport,
    pub structure: StructureReport,
    pub canary: CanaryReport,
    pub context: ContextAssessment,
    pub breakdown: RiskBreakdown,
    pub outcome: Outcome,
}

/// The caller-facing result of handling one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// The generator's answer, already scanned for canary leakage.
    Answer { text: String },
    /// Soft block: an in-character refusal, indistinguishable from a
    /// normal reply at the transport level.
    Refusal { message: String },
    /// Hard block: the identity is banned until `expires_at`.
    HardBlock { expires_at: SystemTime },
    /// Too many requests; retry after the hint.
    RateLimited { retry_after: Duration },
    /// The generator missed its deadline.
    Timeout,
    /// The generator failed outright. The failure detail is logged on the
    /// server side and never carried to the caller.
    Failure,
}

impl Reply {
    /// True for replies that carry generated content.
    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer { .. })
    }
}

/// An in-character refusal, graded by how hostile the request looked.
///
/// The refusal never acknowledges the moderation layer: confirming that a
/// filter fired teaches an attacker which probes land.
pub fn refusal_message(composite: f64) -> &'static str {
    if composite >= 80.0 {
        "I can't help with that. Is there something else I can do for you?"
    } else if composite >= 55.0 {
        "I'd rather not go down that path. What else can I help you with?"
    } else {
        "I don't think I can give you a good answer to that one. Could you rephrase?"
    }
}

/// The refusal used when input is empty after cleanup.
pub fn empty_input_message() -> &'static str {
    "I didn't catch any message there. What would you like to ask?"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_proceeds() {
        assert!(Outcome::Pass.proceeds());
        assert!(Outcome::Delayed.proceeds());
        assert!(!Outcome::ContentBlocked.proceeds());
        assert!(!Outcome::InputRejected.proceeds());
    }

    #[test]
    fn test_refusal_grading() {
        let stern = refusal_message(90.0);
        let standard = refusal_message(60.0);
        let mild = refusal_message(40.0);
        assert_ne!(stern, standard);
        assert_ne!(standard, mild);
    }

    #[test]
    fn test_refusals_never_mention_moderation() {
        for composite in [0.0, 40.0, 60.0, 90.0] {
            let msg = refusal_message(composite).to_lowercase();
            assert!(!msg.contains("filter"));
            assert!(!msg.contains("block"));
            assert!(!msg.contains("policy"));
        }
    }

    #[test]
    fn test_reply_serialization() {
        let reply = Reply::RateLimited {
            retry_after: Duration::from_secs(40),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let parsed: Reply = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reply);
    }
}
