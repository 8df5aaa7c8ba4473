//! Counter-store capability interface.
//!
//! The rate limiter depends only on this trait. The in-process
//! implementation covers the single-instance case; a distributed keyed
//! store with atomic increment semantics slots in behind the same trait
//! when limits must hold across process instances.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A fixed rate window for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    /// Requests counted in the current window.
    pub count: u32,
    /// When the current window opened.
    pub window_start: SystemTime,
}

/// Windowed counter storage with atomic read-modify-write per key.
pub trait CounterStore: Send + Sync {
    /// Count one hit for `key`. If `window_len` has elapsed since the
    /// window opened, the window resets to `{1, now}`; otherwise the count
    /// increments. Returns the window state after the hit.
    ///
    /// Implementations must apply the whole operation atomically per key.
    fn hit(&self, key: &str, window_len: Duration, now: SystemTime) -> RateWindow;

    /// The current window for `key` without counting a hit. Returns `None`
    /// when no window exists or the window has already elapsed.
    fn peek(&self, key: &str, window_len: Duration, now: SystemTime) -> Option<RateWindow>;

    /// Drop the window for `key`, if any.
    fn reset(&self, key: &str);
}

/// Process-local counter store.
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn hit(&self, key: &str, window_len: Duration, now: SystemTime) -> RateWindow {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows
            .entry(key.to_string())
            .or_insert(RateWindow {
                count: 0,
                window_start: now,
            });

        let elapsed = now
            .duration_since(window.window_start)
            .unwrap_or(Duration::ZERO);
        if elapsed >= window_len {
            window.count = 1;
            window.window_start = now;
        } else {
            window.count += 1;
        }
        *window
    }

    fn peek(&self, key: &str, window_len: Duration, now: SystemTime) -> Option<RateWindow> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.get(key)?;
        let elapsed = now
            .duration_since(window.window_start)
            .unwrap_or(Duration::ZERO);
        if elapsed >= window_len {
            None
        } else {
            Some(*window)
        }
    }

    fn reset(&self, key: &str) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_accumulate_within_window() {
        let store = MemoryCounterStore::new();
        let now = SystemTime::now();
        let window = Duration::from_secs(60);

        for expected in 1..=5u32 {
            let w = store.hit("k", window, now);
            assert_eq!(w.count, expected);
        }
    }

    #[test]
    fn test_window_resets_after_elapse() {
        let store = MemoryCounterStore::new();
        let start = SystemTime::now();
        let window = Duration::from_secs(60);

        store.hit("k", window, start);
        store.hit("k", window, start);

        let later = start + Duration::from_secs(61);
        let w = store.hit("k", window, later);
        assert_eq!(w.count, 1);
        assert_eq!(w.window_start, later);
    }

    #[test]
    fn test_keys_independent() {
        let store = MemoryCounterStore::new();
        let now = SystemTime::now();
        let window = Duration::from_secs(60);

        store.hit("a", window, now);
        store.hit("a", window, now);
        let b = store.hit("b", window, now);
        assert_eq!(b.count, 1);
    }

    #[test]
    fn test_peek_does_not_count() {
        let store = MemoryCounterStore::new();
        let now = SystemTime::now();
        let window = Duration::from_secs(60);

        assert!(store.peek("k", window, now).is_none());
        store.hit("k", window, now);
        for _ in 0..5 {
            assert_eq!(store.peek("k", window, now).unwrap().count, 1);
        }
        assert_eq!(store.hit("k", window, now).count, 2);
    }

    #[test]
    fn test_peek_none_after_window_elapses() {
        let store = MemoryCounterStore::new();
        let start = SystemTime::now();
        let window = Duration::from_secs(60);

        store.hit("k", window, start);
        assert!(store.peek("k", window, start + Duration::from_secs(61)).is_none());
    }

    #[test]
    fn test_reset_clears_key() {
        let store = MemoryCounterStore::new();
        let now = SystemTime::now();
        let window = Duration::from_secs(60);

        store.hit("k", window, now);
        store.reset("k");
        let w = store.hit("k", window, now);
        assert_eq!(w.count, 1);
    }
}
