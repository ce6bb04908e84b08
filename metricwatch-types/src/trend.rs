//! Short-term trend estimation.
//!
//! A moving-slope heuristic over the last five observations. The window
//! and the 0.01 / 0.2 / 0.5 thresholds are fixed; dashboards compare
//! against these exact buckets.

use core::fmt;

use crate::TimeSeriesPoint;

/// Number of trailing points the trend is computed from.
pub const TREND_WINDOW: usize = 5;

const STEADY_SLOPE: f64 = 0.01;
const MODERATE_SLOPE: f64 = 0.2;
const RAPID_SLOPE: f64 = 0.5;

/// Direction and speed of recent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Trend {
    Steady,
    SlowRising,
    Rising,
    RapidlyRising,
    SlowFalling,
    Falling,
    RapidlyFalling,
    Fluctuating,
    /// No history at all.
    Unknown,
}

impl Trend {
    /// Kebab-case name of the trend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Steady => "steady",
            Trend::SlowRising => "slow-rising",
            Trend::Rising => "rising",
            Trend::RapidlyRising => "rapidly-rising",
            Trend::SlowFalling => "slow-falling",
            Trend::Falling => "falling",
            Trend::RapidlyFalling => "rapidly-falling",
            Trend::Fluctuating => "fluctuating",
            Trend::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Zero is its own bucket, unlike f64::signum.
fn sign(diff: f64) -> i8 {
    if diff > 0.0 {
        1
    } else if diff < 0.0 {
        -1
    } else {
        0
    }
}

/// Classify the trend of a series.
///
/// Fewer than [`TREND_WINDOW`] points is `Steady`. Otherwise the four
/// consecutive differences of the last five values must share one sign
/// or the series is `Fluctuating`; their mean then picks the bucket.
pub fn classify_trend(series: &[TimeSeriesPoint]) -> Trend {
    if series.len() < TREND_WINDOW {
        return Trend::Steady;
    }

    let window = &series[series.len() - TREND_WINDOW..];
    let diffs: Vec<f64> = window
        .windows(2)
        .map(|pair| pair[1].value - pair[0].value)
        .collect();

    let reference = sign(diffs[0]);
    if diffs.iter().any(|d| sign(*d) != reference) {
        return Trend::Fluctuating;
    }

    let avg = diffs.iter().sum::<f64>() / diffs.len() as f64;
    let magnitude = avg.abs();
    if magnitude < STEADY_SLOPE {
        return Trend::Steady;
    }

    let rising = avg > 0.0;
    match (magnitude > RAPID_SLOPE, magnitude > MODERATE_SLOPE, rising) {
        (true, _, true) => Trend::RapidlyRising,
        (true, _, false) => Trend::RapidlyFalling,
        (false, true, true) => Trend::Rising,
        (false, true, false) => Trend::Falling,
        (false, false, true) => Trend::SlowRising,
        (false, false, false) => Trend::SlowFalling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesPoint::at_millis(i as i64 * 60_000, *v))
            .collect()
    }

    #[test]
    fn short_series_is_steady() {
        assert_eq!(classify_trend(&[]), Trend::Steady);
        assert_eq!(classify_trend(&series(&[1.0, 50.0, 2.0, 90.0])), Trend::Steady);
    }

    #[test]
    fn flat_series_is_steady() {
        assert_eq!(classify_trend(&series(&[10.0; 5])), Trend::Steady);
    }

    #[test]
    fn rising_buckets() {
        assert_eq!(
            classify_trend(&series(&[10.0, 11.0, 12.0, 13.0, 14.0])),
            Trend::RapidlyRising
        );
        assert_eq!(
            classify_trend(&series(&[10.0, 10.3, 10.6, 10.9, 11.2])),
            Trend::Rising
        );
        assert_eq!(
            classify_trend(&series(&[10.0, 10.1, 10.2, 10.3, 10.4])),
            Trend::SlowRising
        );
    }

    #[test]
    fn falling_buckets() {
        assert_eq!(
            classify_trend(&series(&[14.0, 13.0, 12.0, 11.0, 10.0])),
            Trend::RapidlyFalling
        );
        assert_eq!(
            classify_trend(&series(&[11.2, 10.9, 10.6, 10.3, 10.0])),
            Trend::Falling
        );
        assert_eq!(
            classify_trend(&series(&[10.4, 10.3, 10.2, 10.1, 10.0])),
            Trend::SlowFalling
        );
    }

    #[test]
    fn mixed_signs_fluctuate() {
        assert_eq!(
            classify_trend(&series(&[10.0, 12.0, 9.0, 13.0, 8.0])),
            Trend::Fluctuating
        );
    }

    #[test]
    fn zero_difference_breaks_consistency() {
        assert_eq!(
            classify_trend(&series(&[10.0, 11.0, 11.0, 12.0, 13.0])),
            Trend::Fluctuating
        );
    }

    #[test]
    fn tiny_consistent_slope_is_steady() {
        assert_eq!(
            classify_trend(&series(&[10.0, 10.001, 10.002, 10.003, 10.004])),
            Trend::Steady
        );
    }

    #[test]
    fn only_last_five_points_count() {
        let values = [100.0, 0.0, 50.0, 10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(classify_trend(&series(&values)), Trend::RapidlyRising);
    }

    #[test]
    fn kebab_case_names() {
        assert_eq!(Trend::RapidlyFalling.to_string(), "rapidly-falling");
        assert_eq!(Trend::SlowRising.as_str(), "slow-rising");
    }
}
