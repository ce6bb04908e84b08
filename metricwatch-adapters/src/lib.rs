//! # metricwatch-adapters
//!
//! Adapters that fetch a metric's data from its provider and normalize the
//! response into a [`Series`](metricwatch_types::Series).
//!
//! ## Supported Sources
//!
//! - **Log search** (`kibana`) - Queries via the Kibana console proxy, reading
//!   an aggregation, a hit count or raw documents
//! - **Database** (`database`) - Raw queries against the query API
//! - **Generic API** (`api`) - Any JSON endpoint returning rows or a value
//! - **Weather** (`weather_api`) - OpenWeatherMap-compatible current conditions
//!   and forecast
//!
//! Unknown source kinds report no data instead of failing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metricwatch_adapters::DataSourceAdapter;
//! use metricwatch_types::DataSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = DataSourceAdapter::builder()
//!         .kibana_url("http://localhost:5601")
//!         .build()?;
//!
//!     let series = adapter
//!         .fetch(&DataSource::kibana("index=network_metrics | avg(latency)"))
//!         .await?;
//!
//!     println!("Latest value: {}", series.current_value());
//!     Ok(())
//! }
//! ```

mod adapter;
pub mod api;
pub mod database;
pub mod error;
pub mod kibana;
pub mod normalize;
pub mod weather;

#[cfg(test)]
mod testing;

pub use adapter::{DataSourceAdapter, DataSourceAdapterBuilder};
pub use database::DatabaseEndpoint;
pub use error::AdapterError;
pub use kibana::KibanaEndpoint;
pub use weather::WeatherEndpoint;
