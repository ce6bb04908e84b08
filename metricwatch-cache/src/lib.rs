//! # metricwatch-cache
//!
//! The concurrency core of metricwatch: a per-metric snapshot cache with
//! in-flight de-duplication, subscriber fan-out and a periodic refresh
//! scheduler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use metricwatch_adapters::DataSourceAdapter;
//! use metricwatch_cache::{AdapterFetcher, MetricsCache, RefreshScheduler};
//! use metricwatch_types::{DataSource, MetricConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = DataSourceAdapter::builder().build()?;
//!     let cache = MetricsCache::new(AdapterFetcher::new(adapter));
//!
//!     let configs = vec![Arc::new(
//!         MetricConfig::builder("Active Users")
//!             .id("3")
//!             .limits(1000.0, 10000.0)
//!             .source(DataSource::kibana("index=user_sessions | count(distinct user_id)"))
//!             .build(),
//!     )];
//!
//!     // One-off batch refresh
//!     for snapshot in cache.get_all_metrics(&configs).await {
//!         println!("{}: {} ({})", snapshot.name, snapshot.status(), snapshot.trend());
//!     }
//!
//!     // Or keep refreshing in the background
//!     let scheduler = RefreshScheduler::new(cache);
//!     scheduler.arm(configs, Duration::from_secs(60));
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **One fetch per metric**: concurrent requests for an id share a single fetch
//! - **Bounded waits**: joining someone else's fetch gives up after 30 seconds
//! - **No cached failures**: an error is reported per attempt, never memoized
//! - **Atomic batches**: a batch refresh writes all of its entries at once
//! - **Isolated subscribers**: a panicking callback does not stop delivery to others

mod cache;
mod error;
mod fetcher;
mod scheduler;
mod state;
mod subscription;

pub use cache::{MetricsCache, MetricsCacheBuilder, DEFAULT_WAIT_TIMEOUT};
pub use error::{CacheError, FetchError};
pub use fetcher::{AdapterFetcher, MetricFetcher};
pub use scheduler::RefreshScheduler;
pub use subscription::Subscription;

// Re-export types for convenience
pub use metricwatch_types::{MetricConfig, MetricSnapshot, Status, Trend};
