//! Internal state: cache entries and in-flight fetch markers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use metricwatch_types::MetricSnapshot;

use crate::CacheError;

/// Result delivered to everyone waiting on a fetch.
pub(crate) type FetchOutcome = Result<Arc<MetricSnapshot>, CacheError>;

/// The last successful snapshot of a metric.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub snapshot: Arc<MetricSnapshot>,
    pub fetched_at: Instant,
}

impl CacheEntry {
    /// Fresh while less than `window` has passed since the fetch completed.
    pub fn is_fresh(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < window
    }
}

/// An outstanding fetch and the generation of its id when it began.
#[derive(Debug)]
pub(crate) struct InFlight {
    tx: broadcast::Sender<FetchOutcome>,
    generation: (u64, u64),
}

/// Everything guarded by the cache lock.
///
/// An id present in `in_flight` has exactly one outstanding fetch; waiters
/// subscribe to its sender to receive the outcome.
///
/// A fetch only stores its result if neither [`invalidate`](Self::invalidate)
/// nor [`clear`](Self::clear) touched the id after it began.
#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub entries: HashMap<String, CacheEntry>,
    pub in_flight: HashMap<String, InFlight>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl CacheState {
    /// The cached snapshot for `id` if it is still fresh.
    pub fn fresh(&self, id: &str, window: Duration, now: Instant) -> Option<Arc<MetricSnapshot>> {
        self.entries
            .get(id)
            .filter(|entry| entry.is_fresh(window, now))
            .map(|entry| entry.snapshot.clone())
    }

    /// Mark `id` as being fetched. The caller must already have checked
    /// that it is not in flight.
    pub fn begin(&mut self, id: &str) {
        let (tx, _) = broadcast::channel(1);
        let generation = self.generation(id);
        self.in_flight.insert(id.to_string(), InFlight { tx, generation });
    }

    /// Attach to the in-flight fetch for `id`, if there is one.
    pub fn attach(&self, id: &str) -> Option<broadcast::Receiver<FetchOutcome>> {
        self.in_flight.get(id).map(|flight| flight.tx.subscribe())
    }

    /// Drop the entry for `id` and discard the result of any fetch for it
    /// that is still running.
    pub fn invalidate(&mut self, id: &str) -> bool {
        *self.generations.entry(id.to_string()).or_default() += 1;
        self.entries.remove(id).is_some()
    }

    /// Drop every entry and discard the results of running fetches.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.generations.clear();
        self.epoch += 1;
    }

    fn generation(&self, id: &str) -> (u64, u64) {
        (self.epoch, self.generations.get(id).copied().unwrap_or(0))
    }
}

/// Releases in-flight markers.
///
/// [`complete`](InFlightGuard::complete) records the outcomes and wakes the
/// waiters. If the owning future is dropped first, the markers are removed
/// on drop and waiters see the channel close.
pub(crate) struct InFlightGuard<'a> {
    state: &'a Mutex<CacheState>,
    ids: Vec<String>,
}

impl<'a> InFlightGuard<'a> {
    pub fn new(state: &'a Mutex<CacheState>, ids: Vec<String>) -> Self {
        Self { state, ids }
    }

    /// Store successful outcomes under one shared timestamp, clear the
    /// markers and deliver every outcome to its waiters. Outcomes for ids
    /// invalidated since the fetch began reach the waiters but are not stored.
    pub fn complete(mut self, outcomes: &[(String, FetchOutcome)]) {
        let fetched_at = Instant::now();
        let mut released = Vec::with_capacity(outcomes.len());
        {
            let mut state = self.state.lock();
            for (id, outcome) in outcomes {
                let Some(flight) = state.in_flight.remove(id) else {
                    continue;
                };
                if let Ok(snapshot) = outcome {
                    if flight.generation == state.generation(id) {
                        state.entries.insert(
                            id.clone(),
                            CacheEntry {
                                snapshot: snapshot.clone(),
                                fetched_at,
                            },
                        );
                    }
                }
                released.push((flight.tx, outcome.clone()));
            }
            // Ids the fetch never reported on.
            for id in self.ids.drain(..) {
                state.in_flight.remove(&id);
            }
        }

        for (tx, outcome) in released {
            // No receivers just means nobody was waiting.
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        for id in &self.ids {
            state.in_flight.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricwatch_types::{MetricConfig, Series};

    fn snapshot(id: &str) -> Arc<MetricSnapshot> {
        let config = Arc::new(MetricConfig::builder(id).id(id).build());
        Arc::new(MetricSnapshot::evaluate(config, Series::empty()))
    }

    #[tokio::test(start_paused = true)]
    async fn freshness_window_is_exclusive() {
        let entry = CacheEntry {
            snapshot: snapshot("a"),
            fetched_at: Instant::now(),
        };
        let window = Duration::from_secs(5);

        assert!(entry.is_fresh(window, Instant::now()));
        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(entry.is_fresh(window, Instant::now()));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!entry.is_fresh(window, Instant::now()));
    }

    #[tokio::test]
    async fn complete_stores_successes_and_wakes_waiters() {
        let state = Mutex::new(CacheState::default());
        state.lock().begin("a");
        state.lock().begin("b");
        let mut rx_a = state.lock().attach("a").unwrap();
        let mut rx_b = state.lock().attach("b").unwrap();

        let guard = InFlightGuard::new(&state, vec!["a".to_string(), "b".to_string()]);
        let failure = CacheError::Fetch {
            id: "b".to_string(),
            message: "API error: 500".to_string(),
        };
        guard.complete(&[
            ("a".to_string(), Ok(snapshot("a"))),
            ("b".to_string(), Err(failure.clone())),
        ]);

        assert!(rx_a.recv().await.unwrap().is_ok());
        assert_eq!(rx_b.recv().await.unwrap().unwrap_err(), failure);

        let state = state.lock();
        assert!(state.in_flight.is_empty());
        assert!(state.entries.contains_key("a"));
        assert!(!state.entries.contains_key("b"));
    }

    #[tokio::test]
    async fn drop_releases_markers_and_closes_waiters() {
        let state = Mutex::new(CacheState::default());
        state.lock().begin("a");
        let mut rx = state.lock().attach("a").unwrap();

        drop(InFlightGuard::new(&state, vec!["a".to_string()]));

        assert!(state.lock().in_flight.is_empty());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn invalidated_outcome_reaches_waiters_but_is_not_stored() {
        let state = Mutex::new(CacheState::default());
        state.lock().begin("a");
        state.lock().begin("b");
        let mut rx_a = state.lock().attach("a").unwrap();
        state.lock().invalidate("a");

        let guard = InFlightGuard::new(&state, vec!["a".to_string(), "b".to_string()]);
        guard.complete(&[
            ("a".to_string(), Ok(snapshot("a"))),
            ("b".to_string(), Ok(snapshot("b"))),
        ]);

        assert!(rx_a.recv().await.unwrap().is_ok());
        let state = state.lock();
        assert!(!state.entries.contains_key("a"));
        assert!(state.entries.contains_key("b"));
    }

    #[test]
    fn clear_discards_running_fetches() {
        let state = Mutex::new(CacheState::default());
        state.lock().begin("a");
        state.lock().clear();

        InFlightGuard::new(&state, vec!["a".to_string()])
            .complete(&[("a".to_string(), Ok(snapshot("a")))]);

        assert!(state.lock().entries.is_empty());

        // A fetch started after the clear stores normally.
        state.lock().begin("a");
        InFlightGuard::new(&state, vec!["a".to_string()])
            .complete(&[("a".to_string(), Ok(snapshot("a")))]);
        assert!(state.lock().entries.contains_key("a"));
    }

    #[test]
    fn attach_without_fetch_is_none() {
        let state = CacheState::default();
        assert!(state.attach("missing").is_none());
    }
}
