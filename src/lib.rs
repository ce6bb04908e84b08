//! # metricwatch
//!
//! Threshold monitoring for operational metrics. Metric definitions name a
//! data source (a log-search query, a database query, an arbitrary JSON
//! endpoint or a weather provider), control limits and an optional critical
//! threshold. metricwatch fetches each source on its refresh interval,
//! evaluates status and trend, and reports the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                              App                               │
//! │  ┌─────────────┐     ┌───────────────────┐    ┌────────────┐   │
//! │  │ ConfigStore │────▶│ RefreshScheduler  │───▶│  watch rx  │   │
//! │  │ (remote +   │     └─────────┬─────────┘    └────────────┘   │
//! │  │  local)     │               ▼                               │
//! │  └─────────────┘     ┌───────────────────┐                     │
//! │                      │   MetricsCache    │◀── get_metric(..)   │
//! │                      └─────────┬─────────┘                     │
//! │                                ▼                               │
//! │                      ┌───────────────────┐                     │
//! │                      │ DataSourceAdapter │ kibana | database   │
//! │                      └───────────────────┘ api | weather_api   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`store`]**: metric definitions and the global refresh interval, stored
//!   remotely with a local fallback copy
//! - **[`app`]**: keeps the cache and scheduler in step with the store
//! - **[`settings`]**: layered runtime settings
//! - **[`report`]**: text and JSON renderings of a refresh
//!
//! The evaluation rules live in [`metricwatch_types`], the provider clients in
//! [`metricwatch_adapters`] and the cache in [`metricwatch_cache`].
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Refresh every metric once and print the result
//! metricwatch once
//!
//! # Keep refreshing on the configured interval
//! metricwatch --config metricwatch.toml watch
//!
//! # Add a metric from a JSON definition
//! metricwatch add latency.json
//! ```
//!
//! ### As a library
//!
//! ```rust,no_run
//! use metricwatch::{App, Settings};
//! use metricwatch_cache::{AdapterFetcher, MetricsCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let cache = MetricsCache::new(AdapterFetcher::new(settings.adapter()?));
//!     let app = App::new(settings.config_store()?, cache);
//!
//!     app.load().await?;
//!     for snapshot in app.refresh_now().await {
//!         println!("{}", metricwatch::report::render_line(&snapshot));
//!     }
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod logging;
pub mod report;
pub mod settings;
pub mod store;

pub use app::App;
pub use settings::Settings;
pub use store::{Applied, ConfigStore, Persisted, StoreError, ValidationError};
