//! Snapshot - the evaluated, point-in-time view of one metric.

use std::sync::Arc;

use crate::{classify_status, classify_trend, MetricConfig, Series, Status, TimeSeriesPoint, Trend};

/// Message used when a metric has neither cached data nor a fresh result.
pub const DATA_NOT_AVAILABLE: &str = "Data not available";

/// The evaluated state of a metric after a refresh.
///
/// A snapshot carries either a `current_value` or an `error`, never both.
/// Status and trend are derived on demand from the snapshot and its config,
/// so consumers never re-implement the classification rules.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use metricwatch_types::{DataSource, MetricConfig, MetricSnapshot, Series, Status, TimeSeriesPoint};
///
/// let config = Arc::new(
///     MetricConfig::builder("Network Latency")
///         .id("1")
///         .limits(50.0, 150.0)
///         .critical(200.0)
///         .source(DataSource::kibana("index=network_metrics | avg(latency)"))
///         .build(),
/// );
///
/// let series = Series::from_points(vec![TimeSeriesPoint::now(175.0)]);
/// let snapshot = MetricSnapshot::evaluate(config, series);
/// assert_eq!(snapshot.current_value, Some(175.0));
/// assert_eq!(snapshot.status(), Status::Warning);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricSnapshot {
    /// Metric identifier.
    pub id: String,

    /// Metric display name.
    pub name: String,

    /// Current value. `None` when the fetch failed.
    pub current_value: Option<f64>,

    /// History returned by the provider, ascending by timestamp.
    pub historical_data: Vec<TimeSeriesPoint>,

    /// The definition this snapshot was evaluated against.
    pub config: Arc<MetricConfig>,

    /// Failure message, if the fetch failed.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
}

impl MetricSnapshot {
    /// Evaluate a fetched series for a metric.
    ///
    /// An empty series is not an error: it reports a current value of zero.
    pub fn evaluate(config: Arc<MetricConfig>, series: Series) -> Self {
        let current_value = series.current_value();
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            current_value: Some(current_value),
            historical_data: series.points,
            config,
            error: None,
        }
    }

    /// A snapshot describing a failed fetch.
    pub fn failed(config: Arc<MetricConfig>, message: impl Into<String>) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            current_value: None,
            historical_data: Vec::new(),
            config,
            error: Some(message.into()),
        }
    }

    /// The placeholder returned when no data exists for a metric.
    pub fn unavailable(config: Arc<MetricConfig>) -> Self {
        Self::failed(config, DATA_NOT_AVAILABLE)
    }

    /// Whether this snapshot describes a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Threshold status of the current value.
    pub fn status(&self) -> Status {
        classify_status(
            self.current_value,
            self.config.ucl,
            self.config.lcl,
            self.config.critical_threshold,
        )
    }

    /// Trend of the history. `Unknown` when there is no history.
    pub fn trend(&self) -> Trend {
        if self.historical_data.is_empty() {
            return Trend::Unknown;
        }
        classify_trend(&self.historical_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataSource;

    fn config() -> Arc<MetricConfig> {
        Arc::new(
            MetricConfig::builder("Call Drop Rate")
                .id("2")
                .unit("%")
                .limits(0.5, 3.0)
                .critical(5.0)
                .source(DataSource::database("SELECT AVG(drop_rate) FROM call_metrics"))
                .build(),
        )
    }

    #[test]
    fn evaluate_uses_last_point() {
        let series = Series::from_points(vec![
            TimeSeriesPoint::at_millis(0, 1.0),
            TimeSeriesPoint::at_millis(60_000, 2.5),
        ]);
        let snapshot = MetricSnapshot::evaluate(config(), series);

        assert_eq!(snapshot.id, "2");
        assert_eq!(snapshot.name, "Call Drop Rate");
        assert_eq!(snapshot.current_value, Some(2.5));
        assert_eq!(snapshot.historical_data.len(), 2);
        assert_eq!(snapshot.status(), Status::Normal);
        assert!(!snapshot.is_error());
    }

    #[test]
    fn empty_series_reports_zero_and_unknown_trend() {
        let snapshot = MetricSnapshot::evaluate(config(), Series::empty());
        assert_eq!(snapshot.current_value, Some(0.0));
        assert_eq!(snapshot.trend(), Trend::Unknown);
        // 0 < 0.5 / 2 with a threshold set
        assert_eq!(snapshot.status(), Status::Critical);
    }

    #[test]
    fn short_history_is_steady() {
        let series = Series::from_points(vec![
            TimeSeriesPoint::at_millis(0, 1.0),
            TimeSeriesPoint::at_millis(1, 4.0),
        ]);
        assert_eq!(MetricSnapshot::evaluate(config(), series).trend(), Trend::Steady);
    }

    #[test]
    fn explicit_current_wins() {
        let series =
            Series::from_points(vec![TimeSeriesPoint::at_millis(0, 1.0)]).with_current(4.0);
        let snapshot = MetricSnapshot::evaluate(config(), series);
        assert_eq!(snapshot.current_value, Some(4.0));
        assert_eq!(snapshot.status(), Status::Warning);
    }

    #[test]
    fn failure_has_no_value() {
        let snapshot = MetricSnapshot::failed(config(), "API error: 503");
        assert_eq!(snapshot.current_value, None);
        assert_eq!(snapshot.error.as_deref(), Some("API error: 503"));
        assert_eq!(snapshot.status(), Status::Unknown);
    }

    #[test]
    fn unavailable_placeholder() {
        let snapshot = MetricSnapshot::unavailable(config());
        assert_eq!(snapshot.error.as_deref(), Some(DATA_NOT_AVAILABLE));
        assert!(snapshot.historical_data.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_camel_case() {
        let snapshot = MetricSnapshot::evaluate(config(), Series::empty());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["currentValue"], 0.0);
        assert!(value["historicalData"].as_array().unwrap().is_empty());
        assert_eq!(value["config"]["dataSource"]["type"], "database");
        assert!(value.get("error").is_none());
    }
}
