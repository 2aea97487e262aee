//! Snapshot publisher - throttled fan-out to registered observers
//!
//! Observers are keyed by a [`SubscriptionId`]; removing an id twice is a
//! no-op. A notification that arrives inside the throttle gap is dropped.

use crate::feed::clock::Clock;
use crate::feed::snapshot::Quote;
use crate::types::EpochMillis;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observer callback receiving the full batch of current quotes
pub type SnapshotCallback = Arc<dyn Fn(&[Quote]) + Send + Sync>;

/// Handle identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Result of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered to this many subscribers (failed callbacks included)
    Delivered(usize),
    /// Dropped because the previous notification was too recent
    Throttled,
}

pub struct SnapshotPublisher {
    subscribers: Mutex<BTreeMap<SubscriptionId, SnapshotCallback>>,
    next_id: AtomicU64,
    throttle: Duration,
    last_notified: Mutex<Option<EpochMillis>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SnapshotPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPublisher")
            .field("subscribers", &self.subscriber_count())
            .field("throttle", &self.throttle)
            .field("last_notified", &*self.last_notified.lock())
            .finish()
    }
}

impl SnapshotPublisher {
    pub fn new(throttle: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            throttle,
            last_notified: Mutex::new(None),
            clock,
        }
    }

    /// Register an observer
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Quote]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().insert(id, Arc::new(callback));
        log::debug!("Registered snapshot subscriber {:?}", id);
        id
    }

    /// Remove an observer. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            log::debug!("Removed snapshot subscriber {:?}", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Notify every observer unless the throttle gap has not elapsed
    pub fn publish(&self, quotes: &[Quote]) -> PublishOutcome {
        let now = self.clock.now_millis();
        {
            let mut last = self.last_notified.lock();
            if let Some(prev) = *last {
                if now.saturating_sub(prev) < self.throttle.as_millis() as i64 {
                    log::debug!("Dropping snapshot notification inside throttle gap");
                    return PublishOutcome::Throttled;
                }
            }
            *last = Some(now);
        }

        // Invoke outside the registry lock so observers may (un)subscribe
        let callbacks: Vec<(SubscriptionId, SnapshotCallback)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        for (id, callback) in &callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(quotes)));
            if outcome.is_err() {
                log::error!("Snapshot subscriber {:?} panicked; continuing", id);
            }
        }

        PublishOutcome::Delivered(callbacks.len())
    }
}
