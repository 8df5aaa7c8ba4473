//! Sled-backed event log with capped retention.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{EventKind, SecurityEvent};
use crate::Result;

/// Tree name for the event sequence.
const EVENT_TREE: &str = "events";

/// Default retention cap.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Event log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Database directory. `None` opens a temporary in-memory store, a
    /// supported mode for tests and ephemeral deployments.
    pub path: Option<PathBuf>,
    /// Retention cap; the oldest events are trimmed past this.
    pub max_events: usize,
    /// Event kinds to record. `None` records everything.
    pub record_kinds: Option<Vec<EventKind>>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_events: DEFAULT_MAX_EVENTS,
            record_kinds: None,
        }
    }
}

/// Append-only security event log.
///
/// Events are keyed by a monotonic sequence number stored big-endian, so
/// Sled's key order is insertion order. The sequence survives restarts:
/// it reseeds from the highest stored key on open.
///
/// # Thread Safety
///
/// The underlying Sled database is thread-safe; `EventLog` adds only an
/// atomic sequence counter and is safe to share behind an `Arc`.
pub struct EventLog {
    db: sled::Db,
    events: sled::Tree,
    next_seq: AtomicU64,
    max_events: usize,
    record_kinds: Option<Vec<EventKind>>,
}

impl EventLog {
    /// Open or create the log described by `config`.
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        let db = match &config.path {
            Some(path) => sled::open(path)?,
            None => sled::Config::new().temporary(true).open()?,
        };
        Self::with_db(db, config.max_events, config.record_kinds.clone())
    }

    /// Open or create a durable log at `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_db(sled::open(path)?, DEFAULT_MAX_EVENTS, None)
    }

    /// Temporary in-memory log. Data is lost on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, DEFAULT_MAX_EVENTS, None)
    }

    fn with_db(
        db: sled::Db,
        max_events: usize,
        record_kinds: Option<Vec<EventKind>>,
    ) -> Result<Self> {
        let events = db.open_tree(EVENT_TREE)?;
        let next_seq = match events.last()? {
            Some((key, _)) => decode_seq(&key) + 1,
            None => 0,
        };
        Ok(Self {
            db,
            events,
            next_seq: AtomicU64::new(next_seq),
            max_events,
            record_kinds,
        })
    }

    /// Record one event. Storage failures are logged and swallowed: the
    /// log must never fail the request that produced the event.
    pub fn record(&self, event: &SecurityEvent) {
        if let Some(kinds) = &self.record_kinds {
            if !kinds.contains(&event.kind) {
                debug!(kind = ?event.kind, "event kind filtered, not recorded");
                return;
            }
        }
        if let Err(error) = self.append(event) {
            warn!(%error, kind = ?event.kind, "failed to record security event");
        }
    }

    fn append(&self, event: &SecurityEvent) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let bytes = serde_json::to_vec(event)?;
        self.events.insert(seq.to_be_bytes(), bytes)?;
        self.trim()?;
        Ok(())
    }

    /// Drop oldest events until the retention cap holds.
    fn trim(&self) -> Result<()> {
        while self.events.len() > self.max_events {
            if self.events.pop_min()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// The `limit` most recent events, newest first. Entries that fail to
    /// deserialize are skipped with a warning rather than aborting the
    /// scan.
    pub fn recent(&self, limit: usize) -> Result<Vec<SecurityEvent>> {
        let mut out = Vec::with_capacity(limit.min(self.events.len()));
        for item in self.events.iter().rev() {
            if out.len() >= limit {
                break;
            }
            let (key, value) = item?;
            match serde_json::from_slice::<SecurityEvent>(&value) {
                Ok(event) => out.push(event),
                Err(error) => {
                    warn!(%error, seq = decode_seq(&key), "skipping corrupt event record");
                }
            }
        }
        Ok(out)
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing has been recorded (or everything was trimmed).
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Flush pending writes to disk. Returns the number of bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("events", &self.len())
            .field("max_events", &self.max_events)
            .finish()
    }
}

fn decode_seq(key: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let take = key.len().min(8);
    buf[8 - take..].copy_from_slice(&key[..take]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, input: &str) -> SecurityEvent {
        SecurityEvent::new(kind, "tester", input, 50)
    }

    #[test]
    fn test_record_and_recent() {
        let log = EventLog::temporary().unwrap();
        log.record(&event(EventKind::ContentBlocked, "first"));
        log.record(&event(EventKind::RateLimited, "second"));

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].truncated_input, "second");
        assert_eq!(recent[1].truncated_input, "first");
    }

    #[test]
    fn test_recent_respects_limit() {
        let log = EventLog::temporary().unwrap();
        for i in 0..5 {
            log.record(&event(EventKind::ContentBlocked, &format!("input {i}")));
        }
        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].truncated_input, "input 4");
    }

    #[test]
    fn test_retention_trims_oldest() {
        let config = AuditConfig {
            max_events: 3,
            ..AuditConfig::default()
        };
        let log = EventLog::from_config(&config).unwrap();
        for i in 0..6 {
            log.record(&event(EventKind::ContentBlocked, &format!("input {i}")));
        }

        assert_eq!(log.len(), 3);
        let recent = log.recent(10).unwrap();
        assert_eq!(recent[0].truncated_input, "input 5");
        assert_eq!(recent[2].truncated_input, "input 3");
    }

    #[test]
    fn test_kind_allowlist_filters() {
        let config = AuditConfig {
            record_kinds: Some(vec![EventKind::BanIssued]),
            ..AuditConfig::default()
        };
        let log = EventLog::from_config(&config).unwrap();

        log.record(&event(EventKind::ContentBlocked, "filtered"));
        log.record(&event(EventKind::BanIssued, "kept"));

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, EventKind::BanIssued);
    }

    #[test]
    fn test_sequence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = EventLog::open(dir.path()).unwrap();
            log.record(&event(EventKind::ContentBlocked, "before restart"));
            log.flush().unwrap();
        }

        let log = EventLog::open(dir.path()).unwrap();
        log.record(&event(EventKind::ContentBlocked, "after restart"));

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].truncated_input, "after restart");
        assert_eq!(recent[1].truncated_input, "before restart");
    }

    #[test]
    fn test_empty_log() {
        let log = EventLog::temporary().unwrap();
        assert!(log.is_empty());
        assert!(log.recent(10).unwrap().is_empty());
    }
}
