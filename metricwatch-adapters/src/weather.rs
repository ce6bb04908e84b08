//! Weather adapter for OpenWeatherMap-compatible APIs.
//!
//! Two calls are made per fetch: current conditions become the snapshot's
//! current value, the forecast list becomes its history.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use metricwatch_types::{Series, TimeSeriesPoint, WeatherMetric};

use crate::normalize;
use crate::AdapterError;

/// Where to reach the weather provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherEndpoint {
    /// Base URL (default: `https://api.openweathermap.org/data/2.5`).
    pub url: String,
    /// Provider API key.
    pub api_key: Option<String>,
}

impl Default for WeatherEndpoint {
    fn default() -> Self {
        Self {
            url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: None,
        }
    }
}

pub(crate) async fn fetch(
    client: &Client,
    endpoint: &WeatherEndpoint,
    city: &str,
    metric: &WeatherMetric,
) -> Result<Series, AdapterError> {
    let api_key = endpoint
        .api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AdapterError::Config("weather API key is not configured".to_string()))?;
    if city.is_empty() {
        return Err(AdapterError::Config("weather data source has no city".to_string()));
    }
    debug!(city, %metric, "Fetching weather data");

    let (current, forecast) = tokio::try_join!(
        get(client, endpoint, "weather", city, api_key),
        get(client, endpoint, "forecast", city, api_key),
    )?;

    parse_response(&current, &forecast, metric)
}

async fn get(
    client: &Client,
    endpoint: &WeatherEndpoint,
    resource: &str,
    city: &str,
    api_key: &str,
) -> Result<Value, AdapterError> {
    let url = format!("{}/{}", endpoint.url, resource);

    let response = client
        .get(&url)
        .query(&[("q", city), ("units", "metric"), ("appid", api_key)])
        .send()
        .await?;

    if response.status() == StatusCode::UNAUTHORIZED {
        return Err(AdapterError::Auth("Invalid weather API key".to_string()));
    }

    if response.status() == StatusCode::NOT_FOUND {
        return Err(AdapterError::Http(format!("City '{}' not found", city)));
    }

    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "Weather API returned status {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))
}

/// Project one weather payload onto the tracked reading.
///
/// Unsupported metric types read as zero.
pub fn project(payload: &Value, metric: &WeatherMetric) -> Result<f64, AdapterError> {
    let pointer = match metric {
        WeatherMetric::Temperature => "/main/temp",
        WeatherMetric::Humidity => "/main/humidity",
        WeatherMetric::WindSpeed => "/wind/speed",
        WeatherMetric::Pressure => "/main/pressure",
        WeatherMetric::Unsupported(_) => return Ok(0.0),
    };

    payload
        .pointer(pointer)
        .and_then(normalize::number)
        .ok_or_else(|| {
            AdapterError::Parse(format!(
                "weather response has no {}",
                pointer.trim_start_matches('/').replace('/', ".")
            ))
        })
}

/// Combine current conditions and a forecast into a series.
pub fn parse_response(
    current: &Value,
    forecast: &Value,
    metric: &WeatherMetric,
) -> Result<Series, AdapterError> {
    let current_value = project(current, metric)?;

    let entries = forecast
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::Parse("forecast response has no list".to_string()))?;

    let fetched_at = Utc::now();
    let points = entries
        .iter()
        .map(|entry| {
            let when = entry.get("dt_txt").or_else(|| entry.get("dt"));
            Ok(TimeSeriesPoint::new(
                normalize::timestamp(when, fetched_at),
                project(entry, metric)?,
            ))
        })
        .collect::<Result<Vec<_>, AdapterError>>()?;

    Ok(Series::from_points(points).with_current(current_value))
}
