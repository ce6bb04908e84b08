//! Field-level validation of metric definitions.
//!
//! Validation runs before anything is sent to the backend or written
//! locally. Field keys follow the dashboard form (`name`, `ucl`,
//! `dataSource.params.city`, ...).

use std::collections::BTreeMap;

use thiserror::Error;

use metricwatch_types::{MetricConfig, MetricConfigPatch, RefreshInterval, SourceKind};

/// One or more invalid fields, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid metric configuration: {}", self.describe())]
pub struct ValidationError {
    fields: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. The first message per field wins.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `(field, message)` pairs in field order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `field: message` pairs joined with `; `.
    pub fn describe(&self) -> String {
        self.fields()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Validate a complete metric definition.
pub fn validate_metric(metric: &MetricConfig) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    required(&mut errors, "name", &metric.name, "Name is required");
    required(&mut errors, "description", &metric.description, "Description is required");
    required(&mut errors, "unit", &metric.unit, "Unit is required");
    limits(&mut errors, Some(metric.ucl), Some(metric.lcl));
    critical(&mut errors, metric.critical_threshold);
    source(&mut errors, &metric.data_source.kind);
    refresh_interval(&mut errors, metric.refresh_interval());

    errors.into_result()
}

/// Validate a partial update against the metric it will be applied to.
pub fn validate_update(
    current: &MetricConfig,
    patch: &MetricConfigPatch,
) -> Result<(), ValidationError> {
    validate_metric(&current.patched(patch))
}

/// Validate a partial update on its own, for when the target is unknown.
///
/// Only the fields the patch sets are checked; the limit ordering is checked
/// only when both limits are present.
pub fn validate_patch(patch: &MetricConfigPatch) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    if let Some(name) = &patch.name {
        required(&mut errors, "name", name, "Name is required");
    }
    if let Some(description) = &patch.description {
        required(&mut errors, "description", description, "Description is required");
    }
    if let Some(unit) = &patch.unit {
        required(&mut errors, "unit", unit, "Unit is required");
    }
    limits(&mut errors, patch.ucl, patch.lcl);
    if let Some(threshold) = patch.critical_threshold {
        critical(&mut errors, threshold);
    }
    if let Some(data_source) = &patch.data_source {
        source(&mut errors, &data_source.kind);
        refresh_interval(&mut errors, data_source.refresh_interval);
    }

    errors.into_result()
}

/// Validate the global refresh interval.
pub fn validate_refresh_interval(interval: RefreshInterval) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    refresh_interval(&mut errors, interval);
    errors.into_result()
}

fn required(errors: &mut ValidationError, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field, message);
    }
}

fn limits(errors: &mut ValidationError, ucl: Option<f64>, lcl: Option<f64>) {
    if ucl.is_some_and(|v| !v.is_finite()) {
        errors.insert("ucl", "UCL must be a number");
    }
    if lcl.is_some_and(|v| !v.is_finite()) {
        errors.insert("lcl", "LCL must be a number");
    }
    if let (Some(ucl), Some(lcl)) = (ucl, lcl) {
        if ucl.is_finite() && lcl.is_finite() && lcl >= ucl {
            errors.insert("lcl", "LCL must be less than UCL");
            errors.insert("ucl", "UCL must be greater than LCL");
        }
    }
}

fn critical(errors: &mut ValidationError, threshold: Option<f64>) {
    if threshold.is_some_and(|v| !v.is_finite()) {
        errors.insert("criticalThreshold", "Critical threshold must be a number");
    }
}

fn source(errors: &mut ValidationError, kind: &SourceKind) {
    match kind {
        SourceKind::Kibana { query, .. } | SourceKind::Database { query } => {
            required(errors, "query", query, "Query is required");
        }
        SourceKind::Api { url, body, method } => {
            required(errors, "query", url, "Query is required");
            if let Some(body) = body.as_deref().filter(|_| method.sends_body()) {
                if serde_json::from_str::<serde_json::Value>(body).is_err() {
                    errors.insert("dataSource.body", "Request body must be valid JSON");
                }
            }
        }
        SourceKind::WeatherApi { city, metric } => {
            required(errors, "dataSource.params.city", city, "City is required");
            if metric.as_str().trim().is_empty() {
                errors.insert("dataSource.params.metricType", "Weather metric type is required");
            } else if !metric.is_supported() {
                errors.insert(
                    "dataSource.params.metricType",
                    format!("Unsupported weather metric type '{metric}'"),
                );
            }
        }
        SourceKind::Unrecognized { kind, .. } => {
            errors.insert("dataSource.type", format!("Unsupported data source type '{kind}'"));
        }
    }
}

fn refresh_interval(errors: &mut ValidationError, interval: RefreshInterval) {
    if !interval.is_allowed() {
        errors.insert("refreshInterval", "Refresh interval must be at least 5 seconds");
    }
}
