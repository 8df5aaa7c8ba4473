//! The downstream generator contract.
//!
//! The warden never generates text itself; it brokers calls to an upstream
//! collaborator behind this trait. The trait is async and object-safe so
//! the facade can hold `&dyn Upstream` supplied per call - production wires
//! in a real model client, tests wire in scripted doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn of the conversation, supplied by the caller.
///
/// History is caller-controlled data: the facade re-sanitizes every turn
/// before forwarding, so a hostile payload smuggled into "prior
/// conversation" gets the same treatment as the live message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Failure modes of the downstream generator.
///
/// `Timeout` is distinguishable from other failures because the two map to
/// different replies: a timeout is retryable and reported as such, a
/// failure is not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The generator did not answer within its deadline.
    #[error("downstream generator timed out")]
    Timeout,

    /// The generator answered with an error.
    #[error("downstream generator failed: {0}")]
    Failed(String),
}

/// The downstream text generator.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Produce a reply to `message` given the sealed `system` instructions
    /// and the sanitized conversation `history`.
    async fn send(
        &self,
        system: &str,
        history: &[Turn],
        message: &str,
    ) -> std::result::Result<String, UpstreamError>;
}
