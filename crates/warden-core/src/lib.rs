//! # Chat Warden Core
//!
//! Unified moderation pipeline for a generative text service. Orchestrates
//! content screening, identity behavior tracking, volumetric throttling,
//! and the audit log behind one facade.
//!
//! ## Threat Coverage
//!
//! | Layer | Component | Threats Addressed |
//! |-------|-----------|-------------------|
//! | Content | `warden-screen` | Prompt injection, obfuscation, instruction leakage |
//! | Behavior | `warden-context` | Slow-escalation attacks across many messages |
//! | Volume | `warden-throttle` | Request flooding, repeat offenders |
//! | Forensics | `warden-audit` | Post-hoc review of every consequential decision |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WARDEN CORE                           │
//! │                                                              │
//! │                    ┌───────────────┐                         │
//! │   request ───────▶ │    Warden     │ ────▶ Reply             │
//! │                    │    facade     │                         │
//! │                    └───────┬───────┘                         │
//! │        ┌───────────┬───────┴────┬─────────────┐              │
//! │        ▼           ▼            ▼             ▼              │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐         │
//! │  │  Screen  │ │ Context  │ │ Throttle │ │  Audit   │         │
//! │  │ detectors│ │ tracker  │ │  + bans  │ │   log    │         │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────┘         │
//! │                                  │                           │
//! │                                  ▼                           │
//! │                         downstream generator                 │
//! │                        (behind `Upstream`)                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{Reply, Warden, WardenConfig};
//!
//! let warden = Warden::new(WardenConfig::default())?;
//!
//! match warden.handle("user-42", message, &history, &generator).await {
//!     Reply::Answer { text } => respond(text),
//!     Reply::Refusal { message } => respond(message),
//!     Reply::HardBlock { expires_at } => forbidden(expires_at),
//!     Reply::RateLimited { retry_after } => too_many_requests(retry_after),
//!     Reply::Timeout => gateway_timeout(),
//!     Reply::Failure => internal_error(),
//! }
//! ```
//!
//! ## Security Notes
//!
//! - Gate order is fixed: active ban, then rate window, then content.
//! - A canary leak blocks unconditionally, in either direction.
//! - Refusals are in-character; the moderation layer never announces itself.
//! - The audit log observes and never gates: its failures are swallowed.

pub mod aggregate;
mod config;
mod decision;
mod error;
mod upstream;
mod warden;

pub use aggregate::{decide, RiskBreakdown};
pub use config::{GlobalConfig, ScreenConfig, WardenConfig};
pub use decision::{refusal_message, Outcome, Reply, Screening};
pub use error::WardenError;
pub use upstream::{Role, Turn, Upstream, UpstreamError};
pub use warden::Warden;

// Re-export component types callers commonly need.
pub use warden_audit::{AuditConfig, EventKind, SecurityEvent};
pub use warden_context::{AnomalyLabel, ContextAssessment, ContextConfig, ThreatBand};
pub use warden_screen::{CanaryReport, ObfuscationReport, PatternReport, StructureReport};
pub use warden_throttle::{Admission, BanReason, BanRecord, ThrottleConfig};

/// Core result type for warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
