//! Text and JSON renderings of a refresh result.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};

use metricwatch_types::{MetricSnapshot, Status};

/// One line per metric: name, value and unit, status label, trend.
pub fn render_line(snapshot: &MetricSnapshot) -> String {
    let config = &snapshot.config;
    let value = match snapshot.current_value {
        Some(value) if snapshot.error.is_none() => value,
        _ => {
            let error = snapshot.error.as_deref().unwrap_or("no value");
            return format!("{:<28} {:>12}  ERROR     {}", snapshot.name, "-", error);
        }
    };

    let limits = match config.critical_threshold {
        Some(critical) => format!("[{} .. {}] crit {}", config.lcl, config.ucl, critical),
        None => format!("[{} .. {}]", config.lcl, config.ucl),
    };
    format!(
        "{:<28} {:>12.2} {:<6} {:<9} {:<16} {}",
        snapshot.name,
        value,
        config.unit,
        snapshot.status().as_str().to_uppercase(),
        snapshot.trend().as_str(),
        limits
    )
}

/// Per-status counts for a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub normal: usize,
    pub warning: usize,
    pub critical: usize,
    pub errors: usize,
}

impl Summary {
    pub fn of(snapshots: &[Arc<MetricSnapshot>]) -> Self {
        let mut summary = Summary {
            total: snapshots.len(),
            ..Summary::default()
        };
        for snapshot in snapshots {
            if snapshot.is_error() {
                summary.errors += 1;
                continue;
            }
            match snapshot.status() {
                Status::Normal => summary.normal += 1,
                Status::Warning => summary.warning += 1,
                Status::Critical => summary.critical += 1,
                Status::Unknown => summary.errors += 1,
            }
        }
        summary
    }

    pub fn alerting(&self) -> usize {
        self.warning + self.critical
    }
}

/// Full export: a summary block plus every snapshot with its evaluated
/// status and trend.
pub fn export_json(snapshots: &[Arc<MetricSnapshot>]) -> serde_json::Result<Value> {
    let summary = Summary::of(snapshots);

    let mut export = Map::new();
    export.insert("generatedAt".to_string(), json!(Utc::now().to_rfc3339()));
    export.insert(
        "summary".to_string(),
        json!({
            "total": summary.total,
            "normal": summary.normal,
            "warning": summary.warning,
            "critical": summary.critical,
            "errors": summary.errors,
        }),
    );

    let metrics = snapshots
        .iter()
        .map(|s| {
            let mut entry = serde_json::to_value(s.as_ref())?;
            if let Value::Object(map) = &mut entry {
                map.insert("status".to_string(), json!(s.status().as_str()));
                map.insert("trend".to_string(), json!(s.trend().as_str()));
            }
            Ok(entry)
        })
        .collect::<serde_json::Result<Vec<Value>>>()?;
    export.insert("metrics".to_string(), Value::Array(metrics));

    Ok(Value::Object(export))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricwatch_types::{
        DataSource, MetricConfig, Series, TimeSeriesPoint, DATA_NOT_AVAILABLE,
    };

    fn latency() -> Arc<MetricConfig> {
        Arc::new(
            MetricConfig::builder("Network Latency")
                .id("1")
                .unit("ms")
                .limits(50.0, 150.0)
                .critical(200.0)
                .source(DataSource::kibana("index=network_metrics | avg(latency)"))
                .build(),
        )
    }

    fn snapshot(value: f64) -> Arc<MetricSnapshot> {
        Arc::new(MetricSnapshot::evaluate(
            latency(),
            Series::from_points(vec![TimeSeriesPoint::at_millis(0, value)]),
        ))
    }

    #[test]
    fn line_shows_status_and_limits() {
        let line = render_line(&snapshot(175.0));
        assert!(line.starts_with("Network Latency"));
        assert!(line.contains("175.00"));
        assert!(line.contains("WARNING"));
        assert!(line.contains("crit 200"));
    }

    #[test]
    fn error_line_shows_message() {
        let line = render_line(&MetricSnapshot::unavailable(latency()));
        assert!(line.contains("ERROR"));
        assert!(line.contains(DATA_NOT_AVAILABLE));
    }

    #[test]
    fn summary_counts_statuses() {
        let snapshots = vec![
            snapshot(100.0),
            snapshot(175.0),
            snapshot(220.0),
            snapshot(20.0),
            Arc::new(MetricSnapshot::failed(latency(), "Request timed out")),
        ];
        let summary = Summary::of(&snapshots);
        assert_eq!(
            summary,
            Summary {
                total: 5,
                normal: 1,
                warning: 1,
                critical: 2,
                errors: 1,
            }
        );
        assert_eq!(summary.alerting(), 3);
    }

    #[test]
    fn export_includes_evaluations() {
        let export = export_json(&[snapshot(220.0)]).unwrap();
        assert_eq!(export["summary"]["critical"], 1);

        let metric = &export["metrics"][0];
        assert_eq!(metric["id"], "1");
        assert_eq!(metric["currentValue"], 220.0);
        assert_eq!(metric["status"], "critical");
        assert_eq!(metric["trend"], "steady");
        assert_eq!(metric["config"]["criticalThreshold"], 200.0);
        assert!(metric.get("error").is_none());
    }

    #[test]
    fn empty_export_still_has_summary() {
        let export = export_json(&[]).unwrap();
        assert_eq!(export["summary"]["total"], 0);
        assert_eq!(export["metrics"], json!([]));
        assert!(export["generatedAt"].is_string());
    }
}
