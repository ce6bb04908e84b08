//! The seam between the cache and the data sources.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::warn;

use metricwatch_adapters::DataSourceAdapter;
use metricwatch_types::{MetricConfig, MetricSnapshot};

use crate::FetchError;

/// Produces evaluated snapshots for a batch of metrics.
///
/// A failure of one metric is reported as an error snapshot for that
/// metric. `Err` means the whole batch failed.
#[async_trait]
pub trait MetricFetcher: Send + Sync + 'static {
    async fn fetch_batch(
        &self,
        configs: &[Arc<MetricConfig>],
    ) -> Result<Vec<MetricSnapshot>, FetchError>;
}

/// Fetches each metric through a [`DataSourceAdapter`] and evaluates it.
///
/// The metrics of a batch are fetched concurrently.
#[derive(Debug, Clone)]
pub struct AdapterFetcher {
    adapter: DataSourceAdapter,
}

impl AdapterFetcher {
    pub fn new(adapter: DataSourceAdapter) -> Self {
        Self { adapter }
    }

    /// Fetch and evaluate a single metric.
    pub async fn fetch_one(&self, config: &Arc<MetricConfig>) -> MetricSnapshot {
        match self.adapter.fetch(&config.data_source).await {
            Ok(series) => MetricSnapshot::evaluate(config.clone(), series),
            Err(e) => {
                warn!(metric = %config.id, name = %config.name, error = %e, "Failed to fetch metric data");
                MetricSnapshot::failed(config.clone(), e.to_string())
            }
        }
    }
}

#[async_trait]
impl MetricFetcher for AdapterFetcher {
    async fn fetch_batch(
        &self,
        configs: &[Arc<MetricConfig>],
    ) -> Result<Vec<MetricSnapshot>, FetchError> {
        Ok(join_all(configs.iter().map(|config| self.fetch_one(config))).await)
    }
}
