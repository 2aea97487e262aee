//! Wall-clock source for the replay
//!
//! The synchronizer and publisher never call `Utc::now()` directly; they ask
//! a [`Clock`], so tests can freeze or step time.

use crate::types::{EpochMillis, Timestamp};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of "now" in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> EpochMillis;

    fn now_utc(&self) -> Timestamp {
        Utc.timestamp_millis_opt(self.now_millis())
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock; clones share the same instant
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_millis: EpochMillis) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn set(&self, millis: EpochMillis) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance_secs(2);
        assert_eq!(other.now_millis(), 3_000);
        other.set(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_now_utc_follows_millis() {
        let clock = ManualClock::new(1_719_792_000_500);
        assert_eq!(clock.now_utc().timestamp_millis(), 1_719_792_000_500);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
