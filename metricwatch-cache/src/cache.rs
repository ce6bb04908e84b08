//! The metric cache.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use metricwatch_types::{MetricConfig, MetricSnapshot};

use crate::state::{CacheState, FetchOutcome, InFlightGuard};
use crate::subscription::{SubscriberRegistry, Subscription};
use crate::{CacheError, MetricFetcher};

/// How long a caller waits on someone else's in-flight fetch by default.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

struct CacheInner {
    fetcher: Arc<dyn MetricFetcher>,
    state: Mutex<CacheState>,
    subscribers: Arc<SubscriberRegistry>,
    wait_timeout: Duration,
}

/// Per-metric snapshot cache.
///
/// Each metric id has at most one fetch outstanding at a time; concurrent
/// callers for the same id share its result. A snapshot stays fresh for its
/// metric's refresh interval. Failed fetches are never cached.
///
/// `MetricsCache` is a cheap handle: clones share the same state.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use metricwatch_adapters::DataSourceAdapter;
/// use metricwatch_cache::{AdapterFetcher, MetricsCache};
/// use metricwatch_types::{DataSource, MetricConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let adapter = DataSourceAdapter::builder().build()?;
///     let cache = MetricsCache::new(AdapterFetcher::new(adapter));
///
///     let latency = Arc::new(
///         MetricConfig::builder("Network Latency")
///             .id("1")
///             .limits(50.0, 150.0)
///             .source(DataSource::kibana("index=network_metrics | avg(latency)"))
///             .build(),
///     );
///
///     let _subscription = cache.subscribe("1", |snapshot| {
///         println!("{} is now {:?}", snapshot.name, snapshot.current_value);
///     });
///
///     let snapshot = cache.get_metric(&latency).await?;
///     println!("status: {}", snapshot.status());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MetricsCache {
    inner: Arc<CacheInner>,
}

impl MetricsCache {
    /// Create a cache with the default wait timeout.
    pub fn new(fetcher: impl MetricFetcher) -> Self {
        Self::builder(fetcher).build()
    }

    /// Create a builder for configuring the cache.
    pub fn builder(fetcher: impl MetricFetcher) -> MetricsCacheBuilder {
        MetricsCacheBuilder {
            fetcher: Arc::new(fetcher),
            wait_timeout: None,
        }
    }

    /// Get the snapshot of one metric.
    ///
    /// Served from the cache while fresh. Otherwise joins the fetch already
    /// in flight for this id, or starts one.
    pub async fn get_metric(
        &self,
        config: &Arc<MetricConfig>,
    ) -> Result<Arc<MetricSnapshot>, CacheError> {
        let window = config.refresh_interval().to_duration();

        let waiter = {
            let mut state = self.inner.state.lock();
            if let Some(snapshot) = state.fresh(&config.id, window, Instant::now()) {
                trace!(metric = %config.id, "Cache hit");
                return Ok(snapshot);
            }
            let waiter = state.attach(&config.id);
            if waiter.is_none() {
                state.begin(&config.id);
            }
            waiter
        };

        match waiter {
            Some(rx) => self.wait_for(&config.id, rx).await,
            None => self.fetch_one(config).await,
        }
    }

    /// Get several metrics concurrently, each through [`get_metric`](Self::get_metric).
    pub async fn get_metrics(
        &self,
        configs: &[Arc<MetricConfig>],
    ) -> Vec<Result<Arc<MetricSnapshot>, CacheError>> {
        join_all(configs.iter().map(|config| self.get_metric(config))).await
    }

    /// Refresh every stale metric with one batch fetch and return the best
    /// available snapshot for each config, in order.
    ///
    /// Metrics already being fetched elsewhere are awaited rather than
    /// fetched again. A metric with neither cached data nor a fresh result
    /// gets an error snapshot: the fetcher's own error when it reported one,
    /// otherwise "Data not available".
    pub async fn get_all_metrics(&self, configs: &[Arc<MetricConfig>]) -> Vec<Arc<MetricSnapshot>> {
        let mut stale = Vec::new();
        let mut waiting = Vec::new();
        {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            let mut seen = HashSet::new();
            for config in configs {
                if !seen.insert(config.id.as_str()) {
                    continue;
                }
                let window = config.refresh_interval().to_duration();
                if state.fresh(&config.id, window, now).is_some() {
                    continue;
                }
                match state.attach(&config.id) {
                    Some(rx) => waiting.push((config, rx)),
                    None => {
                        state.begin(&config.id);
                        stale.push(config.clone());
                    }
                }
            }
        }

        let mut fetched: HashMap<String, Arc<MetricSnapshot>> = HashMap::new();

        if !stale.is_empty() {
            let outcomes = self.fetch_batch(&stale).await;
            for ((id, outcome), config) in outcomes.into_iter().zip(&stale) {
                match outcome {
                    Ok(snapshot) => {
                        self.inner.subscribers.notify(&snapshot);
                        fetched.insert(id, snapshot);
                    }
                    Err(CacheError::Fetch { message, .. }) => {
                        fetched.insert(id, Arc::new(MetricSnapshot::failed(config.clone(), message)));
                    }
                    Err(_) => {}
                }
            }
        }

        if !waiting.is_empty() {
            let waits = waiting
                .into_iter()
                .map(|(config, rx)| async move { (config, self.wait_for(&config.id, rx).await) });
            for (config, outcome) in join_all(waits).await {
                match outcome {
                    Ok(snapshot) => {
                        fetched.insert(config.id.clone(), snapshot);
                    }
                    Err(CacheError::Fetch { message, .. }) => {
                        fetched.insert(
                            config.id.clone(),
                            Arc::new(MetricSnapshot::failed(config.clone(), message)),
                        );
                    }
                    Err(_) => {}
                }
            }
        }

        let state = self.inner.state.lock();
        configs
            .iter()
            .map(|config| {
                state
                    .entries
                    .get(&config.id)
                    .map(|entry| entry.snapshot.clone())
                    .or_else(|| fetched.get(&config.id).cloned())
                    .unwrap_or_else(|| Arc::new(MetricSnapshot::unavailable(config.clone())))
            })
            .collect()
    }

    /// Register a callback invoked with every refreshed snapshot of `metric_id`.
    pub fn subscribe<F>(&self, metric_id: &str, callback: F) -> Subscription
    where
        F: Fn(&MetricSnapshot) + Send + Sync + 'static,
    {
        let token = self.inner.subscribers.add(metric_id, Arc::new(callback));
        Subscription::new(&self.inner.subscribers, metric_id, token)
    }

    /// Number of live subscriptions for a metric.
    pub fn subscriber_count(&self, metric_id: &str) -> usize {
        self.inner.subscribers.count(metric_id)
    }

    /// Drop the cached snapshot of a metric. Returns whether one existed.
    ///
    /// A fetch for the metric that is already running still answers its
    /// callers, but its result is not cached.
    pub fn invalidate(&self, metric_id: &str) -> bool {
        self.inner.state.lock().invalidate(metric_id)
    }

    /// Drop every cached snapshot, including results of running fetches.
    pub fn clear_all(&self) {
        self.inner.state.lock().clear();
    }

    /// The cached snapshot of a metric, fresh or not.
    pub fn cached(&self, metric_id: &str) -> Option<Arc<MetricSnapshot>> {
        self.inner
            .state
            .lock()
            .entries
            .get(metric_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Whether a fetch for this metric is outstanding.
    pub fn is_in_flight(&self, metric_id: &str) -> bool {
        self.inner.state.lock().in_flight.contains_key(metric_id)
    }

    /// Number of cached snapshots.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bound on waiting for another caller's fetch.
    pub fn wait_timeout(&self) -> Duration {
        self.inner.wait_timeout
    }

    async fn fetch_one(&self, config: &Arc<MetricConfig>) -> Result<Arc<MetricSnapshot>, CacheError> {
        let (_, outcome) = self
            .fetch_batch(std::slice::from_ref(config))
            .await
            .pop()
            .unwrap_or_else(|| (config.id.clone(), Err(missing(&config.id))));

        match &outcome {
            Ok(snapshot) => self.inner.subscribers.notify(snapshot),
            Err(e) => warn!(metric = %config.id, error = %e, "Metric fetch failed"),
        }
        outcome
    }

    /// Fetch configs that this caller has marked in flight and record the
    /// outcomes. Returns one outcome per config, in order.
    async fn fetch_batch(&self, configs: &[Arc<MetricConfig>]) -> Vec<(String, FetchOutcome)> {
        let ids: Vec<String> = configs.iter().map(|c| c.id.clone()).collect();
        let guard = InFlightGuard::new(&self.inner.state, ids);
        debug!(count = configs.len(), "Fetching metrics");

        let outcomes: Vec<(String, FetchOutcome)> = match self.inner.fetcher.fetch_batch(configs).await {
            Ok(snapshots) => {
                let mut by_id: HashMap<String, MetricSnapshot> =
                    snapshots.into_iter().map(|s| (s.id.clone(), s)).collect();
                configs
                    .iter()
                    .map(|config| {
                        let outcome = match by_id.remove(&config.id) {
                            Some(snapshot) => match snapshot.error {
                                Some(message) => Err(CacheError::Fetch {
                                    id: config.id.clone(),
                                    message,
                                }),
                                None => Ok(Arc::new(snapshot)),
                            },
                            None => Err(missing(&config.id)),
                        };
                        (config.id.clone(), outcome)
                    })
                    .collect()
            }
            Err(e) => {
                error!(count = configs.len(), error = %e, "Batch fetch failed");
                configs
                    .iter()
                    .map(|config| {
                        let outcome = Err(CacheError::Unavailable {
                            id: config.id.clone(),
                            reason: e.to_string(),
                        });
                        (config.id.clone(), outcome)
                    })
                    .collect()
            }
        };

        guard.complete(&outcomes);
        outcomes
    }

    async fn wait_for(
        &self,
        metric_id: &str,
        mut rx: broadcast::Receiver<FetchOutcome>,
    ) -> Result<Arc<MetricSnapshot>, CacheError> {
        trace!(metric = %metric_id, "Waiting on in-flight fetch");
        match tokio::time::timeout(self.inner.wait_timeout, rx.recv()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CacheError::Fetch {
                id: metric_id.to_string(),
                message: "Fetch was abandoned before completing".to_string(),
            }),
            Err(_) => {
                warn!(metric = %metric_id, waited = ?self.inner.wait_timeout, "Timed out waiting on in-flight fetch");
                Err(CacheError::Timeout {
                    id: metric_id.to_string(),
                    waited: self.inner.wait_timeout,
                })
            }
        }
    }
}

fn missing(metric_id: &str) -> CacheError {
    CacheError::Unavailable {
        id: metric_id.to_string(),
        reason: "Fetcher returned no snapshot".to_string(),
    }
}

impl fmt::Debug for MetricsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MetricsCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("subscribers", &self.inner.subscribers)
            .field("wait_timeout", &self.inner.wait_timeout)
            .finish()
    }
}

/// Builder for configuring a MetricsCache.
pub struct MetricsCacheBuilder {
    fetcher: Arc<dyn MetricFetcher>,
    wait_timeout: Option<Duration>,
}

impl MetricsCacheBuilder {
    /// Set how long callers wait on another caller's fetch.
    ///
    /// Defaults to 30 seconds if not specified.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Build the cache.
    pub fn build(self) -> MetricsCache {
        MetricsCache {
            inner: Arc::new(CacheInner {
                fetcher: self.fetcher,
                state: Mutex::new(CacheState::default()),
                subscribers: Arc::new(SubscriberRegistry::default()),
                wait_timeout: self.wait_timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT),
            }),
        }
    }
}
