//! # Warden Audit - Security Event Log
//!
//! Append-only, capped event log for the moderation pipeline, backed by
//! Sled. Every consequential decision (blocked content, canary leakage,
//! rate limiting, bans) is recorded here for operator review and
//! forensics.
//!
//! ## Storage Structure
//!
//! One tree holds all events:
//!
//! | Tree | Key | Value | Purpose |
//! |------|-----|-------|---------|
//! | `events` | big-endian u64 sequence | serialized SecurityEvent | Chronological log |
//!
//! Big-endian sequence keys make Sled's lexicographic iteration order the
//! insertion order, so `recent()` is a reverse scan and retention trims
//! from the front.
//!
//! ## Failure Policy
//!
//! The log is an observer, never a gate: a failed write must not fail the
//! request that produced the event. [`EventLog::record`] swallows storage
//! errors into a `tracing` warning. Opening the log can fail loudly - a
//! deployment that cannot audit should not start.

pub mod event;
pub mod log;

pub use event::{EventKind, SecurityEvent};
pub use log::{AuditConfig, EventLog};

/// Errors raised when opening or reading the audit store.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The underlying Sled database failed.
    #[error("audit database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored event could not be serialized or deserialized.
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
