//! # Warden Context - Identity Behavior Tracking
//!
//! Single-message scoring misses slow-escalation attacks: a sender who
//! ratchets up pressure across many individually-innocuous messages never
//! trips a per-message threshold. This crate keeps a small decaying state
//! per identity - a confidence score, a drift score, and an anomaly
//! counter - and is the only place in the content pipeline where state
//! persists across requests.
//!
//! ## State model
//!
//! The state is continuous, not a discrete state machine:
//!
//! - **confidence** (0..1, starts at 1.0) - how much the identity is
//!   currently trusted. Falls on threatening input, recovers slowly on
//!   normal input and quickly over idle periods.
//! - **drift** (0..1, starts at 0.0) - how far recent behavior has moved
//!   from the expected baseline.
//! - **anomaly_count** (>= 0) - a leaky accumulator of threat signals.
//!
//! Idle time models natural forgetting: a sender who goes quiet for ten
//! minutes gets a large trust-recovery step, five minutes a smaller one.
//! Confidence and drift are clamped to [0, 1] after every update and the
//! anomaly count never goes negative, no matter how long the update
//! sequence runs.
//!
//! The categorical anomaly label is a read-only projection of the current
//! numbers, never separate state.

mod tracker;

pub use tracker::{
    AnomalyLabel, ContextAssessment, ContextConfig, ContextState, ContextTracker, RecentInput,
    ThreatBand,
};
