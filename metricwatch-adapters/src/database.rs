//! Database adapter using the query API.
//!
//! The raw query is posted as `{"query": ...}`. Responses are either an
//! array of rows or a single object carrying `value`.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use metricwatch_types::{Series, TimeSeriesPoint};

use crate::normalize;
use crate::AdapterError;

/// Where to reach the database query API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEndpoint {
    /// Base URL (default: `http://localhost:3001`).
    pub url: String,
    /// Path of the query endpoint (default: `/api/query`).
    pub api_path: String,
}

impl Default for DatabaseEndpoint {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001".to_string(),
            api_path: "/api/query".to_string(),
        }
    }
}

pub(crate) async fn fetch(
    client: &Client,
    endpoint: &DatabaseEndpoint,
    query: &str,
) -> Result<Series, AdapterError> {
    let url = format!("{}{}", endpoint.url, endpoint.api_path);
    debug!(url = %url, "Executing database query");

    let response = client
        .post(&url)
        .json(&json!({ "query": query }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "Database API returned status {}",
            response.status()
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))?;

    parse_response(&body, Utc::now())
}

/// Normalize a database query response.
pub fn parse_response(body: &Value, fetched_at: DateTime<Utc>) -> Result<Series, AdapterError> {
    let points = match body {
        Value::Null => {
            return Err(AdapterError::Parse(
                "Invalid response from database API".to_string(),
            ))
        }
        Value::Array(rows) => normalize::rows(rows, fetched_at),
        Value::Object(object) if object.contains_key("value") => {
            let value = object.get("value").and_then(normalize::number).unwrap_or(0.0);
            vec![TimeSeriesPoint::new(fetched_at, value)]
        }
        _ => vec![TimeSeriesPoint::new(fetched_at, 0.0)],
    };

    Ok(Series::from_points(points))
}
