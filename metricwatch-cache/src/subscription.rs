//! Per-metric subscriber fan-out.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::warn;

use metricwatch_types::MetricSnapshot;

type Callback = Arc<dyn Fn(&MetricSnapshot) + Send + Sync>;

/// Callbacks registered per metric id.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_token: AtomicU64,
    subscribers: RwLock<HashMap<String, Vec<(u64, Callback)>>>,
}

impl SubscriberRegistry {
    pub fn add(&self, metric_id: &str, callback: Callback) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .entry(metric_id.to_string())
            .or_default()
            .push((token, callback));
        token
    }

    /// Remove one callback. Returns whether it was still registered.
    pub fn remove(&self, metric_id: &str, token: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(metric_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|(t, _)| *t != token);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(metric_id);
        }
        removed
    }

    pub fn count(&self, metric_id: &str) -> usize {
        self.subscribers
            .read()
            .get(metric_id)
            .map_or(0, Vec::len)
    }

    /// Deliver a snapshot to every subscriber of its metric.
    ///
    /// Callbacks run outside the registry lock, so they may subscribe or
    /// unsubscribe. A panicking callback is logged and skipped.
    pub fn notify(&self, snapshot: &MetricSnapshot) {
        let callbacks: Vec<Callback> = match self.subscribers.read().get(&snapshot.id) {
            Some(list) => list.iter().map(|(_, cb)| cb.clone()).collect(),
            None => return,
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                warn!(metric = %snapshot.id, "Subscriber callback panicked");
            }
        }
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.read();
        let total: usize = subscribers.values().map(Vec::len).sum();
        f.debug_struct("SubscriberRegistry")
            .field("metrics", &subscribers.len())
            .field("subscribers", &total)
            .finish()
    }
}

/// Handle to a registered subscriber callback.
///
/// Dropping the handle unsubscribes. [`unsubscribe`](Subscription::unsubscribe)
/// may be called any number of times.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    metric_id: String,
    token: u64,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<SubscriberRegistry>, metric_id: &str, token: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            metric_id: metric_id.to_string(),
            token,
            active: AtomicBool::new(true),
        }
    }

    /// The metric this subscription listens to.
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop receiving updates.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.metric_id, self.token);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
