//! Time series points produced by data-source adapters.

use chrono::{DateTime, TimeZone, Utc};

/// A single observation of a metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSeriesPoint {
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
    /// The observed value.
    pub value: f64,
}

impl TimeSeriesPoint {
    /// Create a point.
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Create a point stamped with the current time.
    pub fn now(value: f64) -> Self {
        Self::new(Utc::now(), value)
    }

    /// Create a point from milliseconds since the Unix epoch.
    ///
    /// Out-of-range timestamps clamp to the epoch.
    pub fn at_millis(millis: i64, value: f64) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self::new(timestamp, value)
    }
}

/// Normalized output of one data-source fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    /// Observations, ascending by timestamp.
    pub points: Vec<TimeSeriesPoint>,
    /// Current value reported separately from the history.
    ///
    /// Only sources with a dedicated "current conditions" call set this;
    /// otherwise the last point is the current value.
    pub current: Option<f64>,
}

impl Series {
    /// An empty series (no data, not an error).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series from points, ordering them by timestamp.
    ///
    /// The sort is stable: points sharing a timestamp keep the order in
    /// which the provider returned them.
    pub fn from_points(mut points: Vec<TimeSeriesPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            points,
            current: None,
        }
    }

    /// Attach a separately reported current value.
    pub fn with_current(mut self, current: f64) -> Self {
        self.current = Some(current);
        self
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The value a snapshot should report as current.
    ///
    /// Falls back to the latest point, then to zero for an empty series.
    pub fn current_value(&self) -> f64 {
        self.current
            .or_else(|| self.points.last().map(|p| p.value))
            .unwrap_or(0.0)
    }
}
