//! Error types for the moderation pipeline.
//!
//! Only construction-time and administrative failures surface as errors.
//! Request-path outcomes (blocked content, rate limits, bans, downstream
//! timeouts) are data, carried by [`crate::Reply`] and [`crate::Outcome`],
//! and audit-log write failures are swallowed inside `warden-audit`.

use thiserror::Error;

/// Core error type for warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The screening rule table failed to load.
    #[error("screening rules failed to load: {0}")]
    Screen(#[from] warden_screen::ScreenError),

    /// The audit store could not be opened.
    #[error("audit log error: {0}")]
    Audit(#[from] warden_audit::AuditError),

    /// The admin secret did not match.
    #[error("admin authorization failed")]
    Unauthorized,
}
