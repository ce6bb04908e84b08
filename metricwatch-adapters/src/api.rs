//! Generic JSON endpoint adapter.

use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use metricwatch_types::{HttpMethod, Series, TimeSeriesPoint};

use crate::normalize;
use crate::AdapterError;

pub(crate) async fn fetch(
    client: &Client,
    url: &str,
    method: HttpMethod,
    body: Option<&str>,
) -> Result<Series, AdapterError> {
    if url.is_empty() {
        return Err(AdapterError::Config("API data source has no URL".to_string()));
    }
    debug!(url, ?method, "Fetching API data");

    let mut request = client.request(to_method(method), url);
    if let Some(body) = body.filter(|_| method.sends_body()) {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| AdapterError::Config(format!("request body is not valid JSON: {e}")))?;
        request = request.json(&json);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "API error: {}",
            response.status().as_u16()
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))?;

    Ok(parse_response(&body, Utc::now()))
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Normalize an arbitrary JSON payload.
///
/// Arrays are read as rows, an object with `value` as one point. Any other
/// payload carries no data.
pub fn parse_response(body: &Value, fetched_at: DateTime<Utc>) -> Series {
    match body {
        Value::Array(rows) => Series::from_points(normalize::rows(rows, fetched_at)),
        Value::Object(object) if object.contains_key("value") => {
            let point = TimeSeriesPoint::new(
                normalize::timestamp(object.get("timestamp"), fetched_at),
                object.get("value").and_then(normalize::number).unwrap_or(0.0),
            );
            Series::from_points(vec![point])
        }
        _ => Series::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_array_payload() {
        let body = json!([
            {"timestamp": "2024-05-01T11:00:00Z", "value": 10},
            {"timestamp": "2024-05-01T11:01:00Z", "value": 12},
        ]);
        let series = parse_response(&body, fetched_at());
        assert_eq!(series.len(), 2);
        assert_eq!(series.current_value(), 12.0);
    }

    #[test]
    fn test_object_payload() {
        let series = parse_response(&json!({"value": 99.9}), fetched_at());
        assert_eq!(series.points, vec![TimeSeriesPoint::new(fetched_at(), 99.9)]);
    }

    #[test]
    fn test_unrecognized_payload_is_empty() {
        assert!(parse_response(&json!({"status": "ok"}), fetched_at()).is_empty());
        assert!(parse_response(&json!(42), fetched_at()).is_empty());
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_method(HttpMethod::Get), Method::GET);
        assert_eq!(to_method(HttpMethod::Put), Method::PUT);
    }

    #[tokio::test]
    async fn test_empty_url_is_config_error() {
        let client = Client::new();
        let err = fetch(&client, "", HttpMethod::Get, None).await.unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_body_is_config_error() {
        let client = Client::new();
        let err = fetch(&client, "http://127.0.0.1:9/metrics", HttpMethod::Post, Some("{oops"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[tokio::test]
    async fn test_error_status_names_the_code() {
        let url = crate::testing::serve("500 Internal Server Error", "{}").await;
        let err = fetch(&crate::testing::client(), &url, HttpMethod::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Http(_)));
        assert_eq!(err.to_string(), "API error: 500");
    }

    #[tokio::test]
    async fn test_non_json_body_is_a_parse_error() {
        let url = crate::testing::serve("200 OK", "<html>maintenance</html>").await;
        let err = fetch(&crate::testing::client(), &url, HttpMethod::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[tokio::test]
    async fn test_success_with_posted_body() {
        let url = crate::testing::serve("200 OK", r#"[{"value": 3}, {"value": "4.5"}]"#).await;
        let series = fetch(
            &crate::testing::client(),
            &url,
            HttpMethod::Post,
            Some(r#"{"window": "5m"}"#),
        )
        .await
        .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.current_value(), 4.5);
    }
}
