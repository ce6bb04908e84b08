//! # metricwatch-types
//!
//! Core types for threshold monitoring of operational metrics. This crate
//! defines the metric definitions shared by the store, the data-source
//! adapters and the cache, together with the pure evaluation rules that turn
//! a fetched time series into a status and a trend.
//!
//! ## Design Goals
//!
//! - **No I/O**: everything here is deterministic given its inputs
//! - **Optional serialization**: enable the `serde` feature for the JSON wire format
//! - **Explicit optionality**: an unset critical threshold is `None`, never `0`
//! - **Closed source kinds**: data sources are a sum type with an explicit
//!   `Unrecognized` variant instead of a free-form type string
//!
//! ## Features
//!
//! - `serde`: JSON serialization matching the backend's `metrics-config` payloads
//!
//! ## Example
//!
//! ```rust
//! use metricwatch_types::{classify_status, classify_trend, Status, Trend, TimeSeriesPoint};
//!
//! assert_eq!(classify_status(Some(175.0), 150.0, 50.0, Some(200.0)), Status::Warning);
//! assert_eq!(classify_status(Some(20.0), 150.0, 50.0, Some(200.0)), Status::Critical);
//!
//! let series: Vec<TimeSeriesPoint> = [10.0, 11.0, 12.0, 13.0, 14.0]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, v)| TimeSeriesPoint::at_millis(i as i64 * 60_000, v))
//!     .collect();
//! assert_eq!(classify_trend(&series), Trend::RapidlyRising);
//! ```

mod config;
mod interval;
mod series;
mod snapshot;
mod status;
mod trend;

pub use config::*;
pub use interval::*;
pub use series::*;
pub use snapshot::*;
pub use status::*;
pub use trend::*;
