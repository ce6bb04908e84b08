//! Application state: the configuration store, the metrics cache and the
//! refresh scheduler wired together.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::info;

use metricwatch_cache::{MetricsCache, RefreshScheduler};
use metricwatch_types::{MetricConfig, MetricConfigPatch, MetricSnapshot, RefreshInterval};

use crate::store::{ConfigStore, Persisted, StoreError};

/// Owns the current metric set and keeps the cache and scheduler in step
/// with configuration changes.
///
/// After every change the affected cache entries are invalidated, the
/// metric list is reloaded from the store and, if the scheduler is running,
/// it is re-armed with the new list and period.
pub struct App {
    store: ConfigStore,
    scheduler: RefreshScheduler,
    metrics: RwLock<Vec<Arc<MetricConfig>>>,
    refresh_interval: RwLock<RefreshInterval>,
}

impl App {
    pub fn new(store: ConfigStore, cache: MetricsCache) -> Self {
        Self {
            store,
            scheduler: RefreshScheduler::new(cache),
            metrics: RwLock::new(Vec::new()),
            refresh_interval: RwLock::new(RefreshInterval::DEFAULT),
        }
    }

    /// Load the metric list and refresh interval from the store.
    pub async fn load(&self) -> Result<(), StoreError> {
        let interval = self.store.get_refresh_interval().await;
        *self.refresh_interval.write() = interval;
        self.reload().await?;
        info!(
            metrics = self.metrics.read().len(),
            interval = %interval,
            "Configuration loaded"
        );
        Ok(())
    }

    /// Start periodic refreshes of the current metric set.
    pub fn start(&self) {
        self.scheduler
            .arm(self.metrics(), self.refresh_interval().to_duration());
    }

    /// Stop periodic refreshes.
    pub fn stop(&self) {
        self.scheduler.disarm();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_armed()
    }

    /// Refresh every metric once, outside the schedule.
    pub async fn refresh_now(&self) -> Vec<Arc<MetricSnapshot>> {
        let metrics = self.metrics();
        self.cache().get_all_metrics(&metrics).await
    }

    /// Results of scheduled refreshes.
    pub fn updates(&self) -> watch::Receiver<Vec<Arc<MetricSnapshot>>> {
        self.scheduler.subscribe()
    }

    pub fn metrics(&self) -> Vec<Arc<MetricConfig>> {
        self.metrics.read().clone()
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        *self.refresh_interval.read()
    }

    pub fn cache(&self) -> &MetricsCache {
        self.scheduler.cache()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub async fn add_metric(
        &self,
        metric: MetricConfig,
    ) -> Result<Persisted<String>, StoreError> {
        let persisted = self.store.create(metric).await?;
        self.cache().invalidate(&persisted.value);
        self.apply_changes().await?;
        Ok(persisted)
    }

    pub async fn update_metric(
        &self,
        id: &str,
        patch: MetricConfigPatch,
    ) -> Result<Persisted<()>, StoreError> {
        let persisted = self.store.update(id, patch).await?;
        self.cache().invalidate(id);
        self.apply_changes().await?;
        Ok(persisted)
    }

    pub async fn delete_metric(&self, id: &str) -> Result<Persisted<()>, StoreError> {
        let persisted = self.store.delete(id).await?;
        self.cache().invalidate(id);
        self.apply_changes().await?;
        Ok(persisted)
    }

    pub async fn clear_metrics(&self) -> Result<Persisted<()>, StoreError> {
        let persisted = self.store.delete_all().await?;
        self.cache().clear_all();
        self.apply_changes().await?;
        Ok(persisted)
    }

    pub async fn set_refresh_interval(
        &self,
        interval: RefreshInterval,
    ) -> Result<Persisted<RefreshInterval>, StoreError> {
        let persisted = self.store.set_refresh_interval(interval).await?;
        *self.refresh_interval.write() = interval;
        if self.is_running() {
            self.start();
        }
        Ok(persisted)
    }

    async fn reload(&self) -> Result<(), StoreError> {
        let metrics = self.store.list().await?;
        *self.metrics.write() = metrics.into_iter().map(Arc::new).collect();
        Ok(())
    }

    async fn apply_changes(&self) -> Result<(), StoreError> {
        self.reload().await?;
        if self.is_running() {
            self.start();
        }
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("metrics", &self.metrics.read().len())
            .field("refresh_interval", &self.refresh_interval())
            .field("running", &self.is_running())
            .finish()
    }
}
