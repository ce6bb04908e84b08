//! Periodic batch refresh.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use metricwatch_types::{MetricConfig, MetricSnapshot};

use crate::MetricsCache;

/// Drives [`MetricsCache::get_all_metrics`] on a fixed period.
///
/// At most one refresh task exists at a time. Re-arming cancels the
/// previous task before installing the new one, and dropping the scheduler
/// cancels whatever is armed.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use metricwatch_adapters::DataSourceAdapter;
/// use metricwatch_cache::{AdapterFetcher, MetricsCache, RefreshScheduler};
/// use metricwatch_types::{DataSource, MetricConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = MetricsCache::new(AdapterFetcher::new(DataSourceAdapter::builder().build()?));
///     let scheduler = RefreshScheduler::new(cache);
///     let mut updates = scheduler.subscribe();
///
///     let configs = vec![Arc::new(
///         MetricConfig::builder("Call Drop Rate")
///             .id("2")
///             .source(DataSource::database("SELECT AVG(drop_rate) FROM call_metrics"))
///             .build(),
///     )];
///     scheduler.arm(configs, Duration::from_secs(60));
///
///     while updates.changed().await.is_ok() {
///         for snapshot in updates.borrow().iter() {
///             println!("{}: {:?}", snapshot.name, snapshot.current_value);
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct RefreshScheduler {
    cache: MetricsCache,
    current: Mutex<Option<ScheduledRefresh>>,
    results: watch::Sender<Vec<Arc<MetricSnapshot>>>,
}

#[derive(Debug)]
struct ScheduledRefresh {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    period: Duration,
}

impl ScheduledRefresh {
    fn stop(self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

impl RefreshScheduler {
    pub fn new(cache: MetricsCache) -> Self {
        let (results, _) = watch::channel(Vec::new());
        Self {
            cache,
            current: Mutex::new(None),
            results,
        }
    }

    /// The cache this scheduler refreshes.
    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    /// Refresh `configs` now and then every `period`, replacing any
    /// previously armed refresh.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&self, configs: Vec<Arc<MetricConfig>>, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            debug!(period = ?previous.period, "Cancelling previous refresh schedule");
            previous.stop();
        }

        info!(metrics = configs.len(), period = ?period, "Arming refresh schedule");

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let cache = self.cache.clone();
        let results = self.results.clone();

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);
            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let snapshots = cache.get_all_metrics(&configs).await;
                        debug!(count = snapshots.len(), "Scheduled refresh complete");
                        results.send_replace(snapshots);
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *current = Some(ScheduledRefresh {
            stop_tx,
            task,
            period,
        });
    }

    /// Cancel the armed refresh, if any.
    pub fn disarm(&self) {
        if let Some(previous) = self.current.lock().take() {
            info!("Disarming refresh schedule");
            previous.stop();
        }
    }

    /// Whether a refresh is armed.
    pub fn is_armed(&self) -> bool {
        self.current.lock().is_some()
    }

    /// The period of the armed refresh.
    pub fn period(&self) -> Option<Duration> {
        self.current.lock().as_ref().map(|refresh| refresh.period)
    }

    /// Receive the snapshots of every scheduled refresh.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Arc<MetricSnapshot>>> {
        self.results.subscribe()
    }

    /// The snapshots of the most recent scheduled refresh.
    pub fn latest(&self) -> Vec<Arc<MetricSnapshot>> {
        self.results.borrow().clone()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(previous) = self.current.get_mut().take() {
            previous.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use metricwatch_types::{DataSource, RefreshInterval, Series};

    use crate::{FetchError, MetricFetcher};

    #[derive(Default)]
    struct RecordingFetcher {
        batches: parking_lot::Mutex<Vec<Vec<String>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetricFetcher for Arc<RecordingFetcher> {
        async fn fetch_batch(
            &self,
            configs: &[Arc<MetricConfig>],
        ) -> Result<Vec<MetricSnapshot>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches
                .lock()
                .push(configs.iter().map(|c| c.id.clone()).collect());
            Ok(configs
                .iter()
                .map(|c| MetricSnapshot::evaluate(c.clone(), Series::empty()))
                .collect())
        }
    }

    fn metric(id: &str) -> Arc<MetricConfig> {
        Arc::new(
            MetricConfig::builder(id)
                .id(id)
                .source(DataSource::database("SELECT 1").with_refresh_interval(RefreshInterval::MIN))
                .build(),
        )
    }

    fn scheduler() -> (Arc<RecordingFetcher>, RefreshScheduler) {
        let fetcher = Arc::new(RecordingFetcher::default());
        let scheduler = RefreshScheduler::new(MetricsCache::new(fetcher.clone()));
        (fetcher, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn first_refresh_runs_immediately_then_periodically() {
        let (fetcher, scheduler) = scheduler();
        let mut updates = scheduler.subscribe();

        scheduler.arm(vec![metric("a"), metric("b")], Duration::from_secs(10));

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().len(), 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        updates.changed().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.latest().len(), 2);
        assert_eq!(scheduler.period(), Some(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_schedule() {
        let (fetcher, scheduler) = scheduler();
        let mut updates = scheduler.subscribe();

        scheduler.arm(vec![metric("a")], Duration::from_secs(10));
        updates.changed().await.unwrap();

        scheduler.arm(vec![metric("b")], Duration::from_secs(10));
        updates.changed().await.unwrap();
        tokio::time::sleep(Duration::from_secs(35)).await;

        let batches = fetcher.batches.lock().clone();
        assert_eq!(batches[0], vec!["a".to_string()]);
        assert!(batches.len() >= 4);
        assert!(batches[1..].iter().all(|batch| batch == &vec!["b".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_stops_refreshing() {
        let (fetcher, scheduler) = scheduler();
        let mut updates = scheduler.subscribe();

        scheduler.arm(vec![metric("a")], Duration::from_secs(10));
        updates.changed().await.unwrap();
        scheduler.disarm();
        assert!(!scheduler.is_armed());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        // Disarming again is harmless.
        scheduler.disarm();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_scheduler_cancels_task() {
        let (fetcher, scheduler) = scheduler();
        let mut updates = scheduler.subscribe();

        scheduler.arm(vec![metric("a")], Duration::from_secs(10));
        updates.changed().await.unwrap();
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_metrics_are_not_refetched_by_fast_schedule() {
        let (fetcher, scheduler) = scheduler();
        let mut updates = scheduler.subscribe();

        // Period shorter than the 5 s freshness window.
        scheduler.arm(vec![metric("a")], Duration::from_secs(1));
        for _ in 0..4 {
            updates.changed().await.unwrap();
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
