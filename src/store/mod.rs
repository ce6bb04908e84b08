//! Configuration store with local fallback.
//!
//! Metric definitions and the global refresh interval live in a remote
//! backend. Every change is attempted there first; when the backend cannot
//! be reached the change is applied to a local copy instead and the result
//! carries a "... locally only" warning. Reads fall back to the local copy
//! in the same way.

mod backend;
mod local;
mod validation;

pub use backend::{BackendError, ConfigBackend, HttpConfigBackend};
pub use local::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use validation::{
    validate_metric, validate_patch, validate_refresh_interval, validate_update, ValidationError,
};

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use metricwatch_types::{MetricConfig, MetricConfigPatch, RefreshInterval};

/// Local key holding the metric list as a JSON array.
pub const METRICS_KEY: &str = "metricsConfig";

/// Local key holding the global refresh interval in milliseconds.
pub const REFRESH_INTERVAL_KEY: &str = "refreshInterval";

/// Errors from [`ConfigStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Neither the backend nor the local copy could be read.
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// The change could be applied neither remotely nor locally.
    #[error("Failed to save configuration: {0}")]
    Persist(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Where a change ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Accepted by the backend (and mirrored locally).
    Remote,
    /// The backend failed; only the local copy changed.
    LocalOnly,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<T> {
    pub value: T,
    pub applied: Applied,
    /// Set when the change is local only, e.g. `"Added locally only"`.
    pub warning: Option<String>,
}

impl<T> Persisted<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            applied: Applied::Remote,
            warning: None,
        }
    }

    fn local_only(value: T, warning: &str) -> Self {
        Self {
            value,
            applied: Applied::LocalOnly,
            warning: Some(warning.to_string()),
        }
    }

    pub fn is_local_only(&self) -> bool {
        self.applied == Applied::LocalOnly
    }
}

/// Reads and writes metric definitions and the refresh interval.
pub struct ConfigStore {
    backend: Arc<dyn ConfigBackend>,
    local: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles on the local copy.
    local_lock: Mutex<()>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}

impl ConfigStore {
    pub fn new(backend: impl ConfigBackend + 'static, local: impl KeyValueStore + 'static) -> Self {
        Self::from_parts(Arc::new(backend), Arc::new(local))
    }

    pub fn from_parts(backend: Arc<dyn ConfigBackend>, local: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            local,
            local_lock: Mutex::new(()),
        }
    }

    /// All metric definitions.
    ///
    /// The backend's answer refreshes the local copy. If the backend fails,
    /// the local copy is returned; no local copy means no metrics.
    pub async fn list(&self) -> Result<Vec<MetricConfig>, StoreError> {
        match self.backend.fetch_metrics().await {
            Ok(metrics) => {
                if let Err(e) = self.write_local(&metrics) {
                    warn!(error = %e, "Failed to cache metric configuration locally");
                }
                Ok(metrics)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch metric configuration, using local copy");
                self.read_local()
            }
        }
    }

    /// Look up one metric definition by id.
    pub async fn get(&self, id: &str) -> Result<Option<MetricConfig>, StoreError> {
        Ok(self.list().await?.into_iter().find(|m| m.id == id))
    }

    /// Replace the whole metric list.
    pub async fn save_all(&self, metrics: Vec<MetricConfig>) -> Result<Persisted<()>, StoreError> {
        for metric in &metrics {
            validate_metric(metric)?;
        }

        let remote = self.backend.save_metrics(&metrics).await;
        self.finish(remote, "Saved locally only", || self.write_local(&metrics))
    }

    /// Add a metric, assigning a fresh id when it has none. Returns the id.
    pub async fn create(&self, mut metric: MetricConfig) -> Result<Persisted<String>, StoreError> {
        validate_metric(&metric)?;
        if metric.id.trim().is_empty() {
            metric.id = Uuid::new_v4().to_string();
        }

        let remote = self.backend.create_metric(&metric).await;
        let id = metric.id.clone();
        self.finish(remote, "Added locally only", || {
            self.modify_local(|metrics| metrics.push(metric))
        })
        .map(|p| Persisted {
            value: id,
            applied: p.applied,
            warning: p.warning,
        })
    }

    /// Apply a partial update to the metric with `id`.
    pub async fn update(
        &self,
        id: &str,
        patch: MetricConfigPatch,
    ) -> Result<Persisted<()>, StoreError> {
        match self.get(id).await {
            Ok(Some(current)) => validate_update(&current, &patch)?,
            _ => validate_patch(&patch)?,
        }

        let remote = self.backend.update_metric(id, &patch).await;
        self.finish(remote, "Updated locally only", || {
            self.modify_local(|metrics| {
                for metric in metrics.iter_mut().filter(|m| m.id == id) {
                    metric.apply(&patch);
                }
            })
        })
    }

    /// Remove the metric with `id`.
    pub async fn delete(&self, id: &str) -> Result<Persisted<()>, StoreError> {
        let remote = self.backend.delete_metric(id).await;
        self.finish(remote, "Deleted locally only", || {
            self.modify_local(|metrics| metrics.retain(|m| m.id != id))
        })
    }

    /// Remove every metric.
    pub async fn delete_all(&self) -> Result<Persisted<()>, StoreError> {
        let remote = self.backend.delete_all().await;
        self.finish(remote, "Cleared locally only", || {
            let _guard = self.local_lock.lock();
            self.local.remove(METRICS_KEY).map_err(|e| e.to_string())
        })
    }

    /// The global refresh interval.
    ///
    /// Falls back to the local copy, then to [`RefreshInterval::DEFAULT`].
    pub async fn get_refresh_interval(&self) -> RefreshInterval {
        match self.backend.fetch_refresh_interval().await {
            Ok(interval) => {
                if let Err(e) = self.write_local_interval(interval) {
                    warn!(error = %e, "Failed to cache refresh interval locally");
                }
                interval
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch refresh interval, using local copy");
                self.read_local_interval().unwrap_or_default()
            }
        }
    }

    /// Change the global refresh interval. Must be at least five seconds.
    pub async fn set_refresh_interval(
        &self,
        interval: RefreshInterval,
    ) -> Result<Persisted<RefreshInterval>, StoreError> {
        validate_refresh_interval(interval)?;

        let remote = self.backend.save_refresh_interval(interval).await;
        self.finish(remote, "Saved locally only", || {
            self.write_local_interval(interval)
        })
        .map(|p| Persisted {
            value: interval,
            applied: p.applied,
            warning: p.warning,
        })
    }

    /// Mirror a change locally and classify the outcome.
    fn finish<F>(
        &self,
        remote: Result<(), BackendError>,
        warning: &str,
        apply_locally: F,
    ) -> Result<Persisted<()>, StoreError>
    where
        F: FnOnce() -> Result<(), String>,
    {
        match remote {
            Ok(()) => {
                if let Err(e) = apply_locally() {
                    warn!(error = %e, "Backend accepted change but local copy was not updated");
                }
                Ok(Persisted::remote(()))
            }
            Err(remote_err) => {
                warn!(error = %remote_err, "{warning}");
                match apply_locally() {
                    Ok(()) => Ok(Persisted::local_only((), warning)),
                    Err(local_err) => Err(StoreError::Persist(format!(
                        "{remote_err}; local copy: {local_err}"
                    ))),
                }
            }
        }
    }

    fn read_local(&self) -> Result<Vec<MetricConfig>, StoreError> {
        let raw = self
            .local
            .get(METRICS_KEY)
            .map_err(|e| StoreError::Load(e.to_string()))?;
        match raw {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| StoreError::Load(e.to_string()))
            }
            None => {
                debug!("No local metric configuration");
                Ok(Vec::new())
            }
        }
    }

    fn write_local(&self, metrics: &[MetricConfig]) -> Result<(), String> {
        let _guard = self.local_lock.lock();
        self.store_metrics(metrics)
    }

    fn store_metrics(&self, metrics: &[MetricConfig]) -> Result<(), String> {
        let json = serde_json::to_string(metrics).map_err(|e| e.to_string())?;
        self.local.set(METRICS_KEY, &json).map_err(|e| e.to_string())
    }

    fn modify_local<F>(&self, change: F) -> Result<(), String>
    where
        F: FnOnce(&mut Vec<MetricConfig>),
    {
        let _guard = self.local_lock.lock();
        let mut metrics = self.read_local().map_err(|e| e.to_string())?;
        change(&mut metrics);
        self.store_metrics(&metrics)
    }

    fn read_local_interval(&self) -> Option<RefreshInterval> {
        let raw = self.local.get(REFRESH_INTERVAL_KEY).ok()??;
        raw.trim().parse().ok().map(RefreshInterval::from_millis)
    }

    fn write_local_interval(&self, interval: RefreshInterval) -> Result<(), String> {
        self.local
            .set(REFRESH_INTERVAL_KEY, &interval.as_millis().to_string())
            .map_err(|e| e.to_string())
    }
}
