//! Helpers shared by the providers for turning loose JSON into points.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use metricwatch_types::TimeSeriesPoint;

/// Fields tried, in order, for a row's value.
const VALUE_FIELDS: [&str; 3] = ["value", "average", "count"];

// Epoch numbers at or above this are milliseconds (year 5138 in seconds).
const MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Read a finite number, accepting numeric strings.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|v: &f64| v.is_finite()),
        _ => None,
    }
}

/// Parse a provider timestamp, falling back to `fetched_at`.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` (taken as UTC) and epoch
/// seconds or milliseconds.
pub fn timestamp(value: Option<&Value>, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Some(Value::Number(n)) => n.as_i64().and_then(|epoch| {
            if epoch.abs() >= MILLIS_CUTOFF {
                Utc.timestamp_millis_opt(epoch).single()
            } else {
                Utc.timestamp_opt(epoch, 0).single()
            }
        }),
        _ => None,
    };
    parsed.unwrap_or(fetched_at)
}

/// The value of a result row: the first present of `value`, `average`, `count`.
pub fn row_value(row: &Value) -> f64 {
    VALUE_FIELDS
        .iter()
        .find_map(|field| row.get(field).filter(|v| !v.is_null()))
        .and_then(number)
        .unwrap_or(0.0)
}

/// Convert result rows into points.
pub fn rows(rows: &[Value], fetched_at: DateTime<Utc>) -> Vec<TimeSeriesPoint> {
    rows.iter()
        .map(|row| TimeSeriesPoint::new(timestamp(row.get("timestamp"), fetched_at), row_value(row)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn numbers_and_numeric_strings() {
        assert_eq!(number(&json!(4.5)), Some(4.5));
        assert_eq!(number(&json!(" 12 ")), Some(12.0));
        assert_eq!(number(&json!("n/a")), None);
        assert_eq!(number(&json!(null)), None);
    }

    #[test]
    fn non_finite_strings_are_rejected() {
        for text in ["NaN", "nan", "inf", "-inf", "infinity", " Infinity "] {
            assert_eq!(number(&json!(text)), None, "{text}");
        }
        assert_eq!(number(&json!("-3.5e2")), Some(-350.0));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
        assert_eq!(timestamp(Some(&json!("2024-03-10T09:30:00Z")), fetched_at()), expected);
        assert_eq!(
            timestamp(Some(&json!("2024-03-10T11:30:00+02:00")), fetched_at()),
            expected
        );
        assert_eq!(timestamp(Some(&json!("2024-03-10 09:30:00")), fetched_at()), expected);
        assert_eq!(timestamp(Some(&json!(1_710_063_000)), fetched_at()), expected);
        assert_eq!(timestamp(Some(&json!(1_710_063_000_000_i64)), fetched_at()), expected);
    }

    #[test]
    fn unparseable_timestamp_uses_fetch_time() {
        assert_eq!(timestamp(Some(&json!("yesterday")), fetched_at()), fetched_at());
        assert_eq!(timestamp(None, fetched_at()), fetched_at());
    }

    #[test]
    fn row_value_first_present_wins() {
        assert_eq!(row_value(&json!({"value": 3, "average": 9})), 3.0);
        assert_eq!(row_value(&json!({"average": "2.5", "count": 9})), 2.5);
        assert_eq!(row_value(&json!({"count": 7})), 7.0);
        assert_eq!(row_value(&json!({"value": null, "count": 7})), 7.0);
        assert_eq!(row_value(&json!({"other": 1})), 0.0);
    }

    #[test]
    fn rows_keep_their_order() {
        let points = rows(
            &[
                json!({"timestamp": "2024-03-10T09:31:00Z", "value": 2}),
                json!({"value": 5}),
            ],
            fetched_at(),
        );
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 2.0);
        assert_eq!(points[1].timestamp, fetched_at());
    }
}
