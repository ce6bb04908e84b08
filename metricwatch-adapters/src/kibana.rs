//! Log-search adapter using the Kibana console proxy.
//!
//! The query is posted together with a relative time window. Which part of
//! the response holds the metric depends on the query's [`KibanaResponse`]
//! shape:
//!
//! - **aggregation**: `aggregations.average.value`
//! - **count**: `hits.total.value`
//! - **documents**: every `hits.hits[]._source`, using `@timestamp` and `value`

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use metricwatch_types::{KibanaResponse, Series, TimeSeriesPoint};

use crate::normalize;
use crate::AdapterError;

/// Where and how to reach the log-search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KibanaEndpoint {
    /// Base URL (default: `http://localhost:5601`).
    pub url: String,
    /// Path of the console proxy (default: `/api/console/proxy`).
    pub api_path: String,
    /// Relative time window, as in `now-<range>` (default: `15m`).
    pub time_range: String,
}

impl Default for KibanaEndpoint {
    fn default() -> Self {
        Self {
            url: "http://localhost:5601".to_string(),
            api_path: "/api/console/proxy".to_string(),
            time_range: "15m".to_string(),
        }
    }
}

pub(crate) async fn fetch(
    client: &Client,
    endpoint: &KibanaEndpoint,
    query: &str,
    shape: KibanaResponse,
) -> Result<Series, AdapterError> {
    let url = format!("{}{}", endpoint.url, endpoint.api_path);
    debug!(url = %url, ?shape, "Executing log-search query");

    let response = client
        .post(&url)
        .header("kbn-xsrf", "true")
        .json(&request_body(query, &endpoint.time_range))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "Kibana returned status {}",
            response.status()
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))?;

    parse_response(&body, shape, Utc::now())
}

fn request_body(query: &str, time_range: &str) -> Value {
    json!({
        "query": query,
        "time": {
            "from": format!("now-{time_range}"),
            "to": "now",
        }
    })
}

/// Normalize a log-search response.
///
/// A response without `hits` is rejected; everything else yields points.
pub fn parse_response(
    body: &Value,
    shape: KibanaResponse,
    fetched_at: DateTime<Utc>,
) -> Result<Series, AdapterError> {
    let hits = body
        .get("hits")
        .filter(|hits| !hits.is_null())
        .ok_or_else(|| AdapterError::Parse("Invalid response format from Kibana".to_string()))?;

    let points = match shape {
        KibanaResponse::Aggregation => {
            let value = body
                .pointer("/aggregations/average/value")
                .and_then(normalize::number)
                .unwrap_or(0.0);
            vec![TimeSeriesPoint::new(fetched_at, value)]
        }
        KibanaResponse::Count => {
            // Older clusters report the total as a bare number.
            let value = hits
                .get("total")
                .and_then(|total| total.get("value").or(Some(total)))
                .and_then(normalize::number)
                .unwrap_or(0.0);
            vec![TimeSeriesPoint::new(fetched_at, value)]
        }
        KibanaResponse::Documents => match hits.get("hits").and_then(Value::as_array) {
            Some(documents) => documents
                .iter()
                .map(|hit| {
                    let source = hit.get("_source");
                    TimeSeriesPoint::new(
                        normalize::timestamp(source.and_then(|s| s.get("@timestamp")), fetched_at),
                        source
                            .and_then(|s| s.get("value"))
                            .and_then(normalize::number)
                            .unwrap_or(0.0),
                    )
                })
                .collect(),
            None => vec![TimeSeriesPoint::new(fetched_at, 0.0)],
        },
    };

    Ok(Series::from_points(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_request_body() {
        let body = request_body("index=network_metrics | avg(latency)", "15m");
        assert_eq!(body["query"], "index=network_metrics | avg(latency)");
        assert_eq!(body["time"]["from"], "now-15m");
        assert_eq!(body["time"]["to"], "now");
    }

    #[test]
    fn test_missing_hits_is_rejected() {
        let err = parse_response(&json!({"took": 3}), KibanaResponse::Count, fetched_at())
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid response format from Kibana");
    }

    #[test]
    fn test_aggregation() {
        let body = json!({
            "hits": {"total": {"value": 120}},
            "aggregations": {"average": {"value": 87.5}}
        });
        let series = parse_response(&body, KibanaResponse::Aggregation, fetched_at()).unwrap();
        assert_eq!(series.points, vec![TimeSeriesPoint::new(fetched_at(), 87.5)]);
    }

    #[test]
    fn test_aggregation_missing_defaults_to_zero() {
        let body = json!({"hits": {}});
        let series = parse_response(&body, KibanaResponse::Aggregation, fetched_at()).unwrap();
        assert_eq!(series.current_value(), 0.0);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_count() {
        let body = json!({"hits": {"total": {"value": 4200, "relation": "eq"}}});
        let series = parse_response(&body, KibanaResponse::Count, fetched_at()).unwrap();
        assert_eq!(series.current_value(), 4200.0);

        let legacy = json!({"hits": {"total": 17}});
        let series = parse_response(&legacy, KibanaResponse::Count, fetched_at()).unwrap();
        assert_eq!(series.current_value(), 17.0);
    }

    #[test]
    fn test_documents() {
        let body = json!({
            "hits": {
                "hits": [
                    {"_source": {"@timestamp": "2024-05-01T11:58:00Z", "value": 3}},
                    {"_source": {"@timestamp": "2024-05-01T11:57:00Z", "value": 1}},
                    {"_source": {"value": 9}},
                ]
            }
        });
        let series = parse_response(&body, KibanaResponse::Documents, fetched_at()).unwrap();

        let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0, 9.0]);
        assert_eq!(series.points[2].timestamp, fetched_at());
    }

    #[test]
    fn test_documents_without_array() {
        let body = json!({"hits": {"total": {"value": 0}}});
        let series = parse_response(&body, KibanaResponse::Documents, fetched_at()).unwrap();
        assert_eq!(series.points, vec![TimeSeriesPoint::new(fetched_at(), 0.0)]);
    }

    #[test]
    fn test_empty_document_list_is_empty_series() {
        let body = json!({"hits": {"hits": []}});
        let series = parse_response(&body, KibanaResponse::Documents, fetched_at()).unwrap();
        assert!(series.is_empty());
    }

    fn endpoint(url: String) -> KibanaEndpoint {
        KibanaEndpoint {
            url,
            ..KibanaEndpoint::default()
        }
    }

    #[tokio::test]
    async fn test_error_status() {
        let url = crate::testing::serve("500 Internal Server Error", "{}").await;
        let err = fetch(
            &crate::testing::client(),
            &endpoint(url),
            "index=app | count",
            KibanaResponse::Count,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AdapterError::Http(_)));
        assert_eq!(
            err.to_string(),
            "Kibana returned status 500 Internal Server Error"
        );
    }

    #[tokio::test]
    async fn test_non_json_body_is_a_parse_error() {
        let url = crate::testing::serve("200 OK", "not json").await;
        let err = fetch(
            &crate::testing::client(),
            &endpoint(url),
            "index=app | count",
            KibanaResponse::Count,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[tokio::test]
    async fn test_count_over_http() {
        let url = crate::testing::serve("200 OK", r#"{"hits": {"total": {"value": 17}}}"#).await;
        let series = fetch(
            &crate::testing::client(),
            &endpoint(url),
            "index=app | count",
            KibanaResponse::Count,
        )
        .await
        .unwrap();

        assert_eq!(series.current_value(), 17.0);
    }
}
