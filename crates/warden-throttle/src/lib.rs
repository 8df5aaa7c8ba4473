//! # Warden Throttle - Volumetric Defense
//!
//! Rate limiting and ban escalation, independent of content risk. This gate
//! runs BEFORE the content pipeline: it is far cheaper than the detectors
//! and protects them from volumetric abuse.
//!
//! ## Per-identity state machine
//!
//! ```text
//! Unrestricted ──(window count exceeded)──▶ Rate-Limited (same window)
//!      ▲                                          │
//!      │                                 window elapses
//!      │                                          ▼
//!      │◀─────────────────────────────── Unrestricted
//!      │
//!      └──(ban expires, lazy check)── Banned ◀──(violations reach threshold)
//! ```
//!
//! Rate limiting uses a fixed window per identity: the window resets when
//! its length has elapsed, and exactly `max_requests` calls succeed inside
//! one window. Bans are issued when content violations (recorded by the
//! decision engine for every blocked request) reach a threshold within a
//! rolling restriction window. Ban expiry is lazy - checked on read, never
//! swept by a background timer. Operators can also impose or lift a ban out
//! of band ([`Throttle::suspend`], [`Throttle::lift_ban`]).
//!
//! Counter state lives behind the [`CounterStore`] capability trait. The
//! in-process [`MemoryCounterStore`] is the default; a shared keyed store
//! with atomic increments can replace it for multi-instance deployments.
//! Running several processes on the in-process store gives per-process
//! limits, which is a documented fallback, not an accident.

mod limiter;
mod store;

pub use limiter::{Admission, BanReason, BanRecord, Throttle, ThrottleConfig};
pub use store::{CounterStore, MemoryCounterStore, RateWindow};
