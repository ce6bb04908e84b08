//! Remote configuration backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use thiserror::Error;

use metricwatch_types::{MetricConfig, MetricConfigPatch, RefreshInterval};

/// Errors talking to the configuration backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Authoritative store of metric definitions and the global refresh interval.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    async fn fetch_metrics(&self) -> Result<Vec<MetricConfig>, BackendError>;

    /// Replace the whole metric list.
    async fn save_metrics(&self, metrics: &[MetricConfig]) -> Result<(), BackendError>;

    async fn create_metric(&self, metric: &MetricConfig) -> Result<(), BackendError>;

    async fn update_metric(&self, id: &str, patch: &MetricConfigPatch)
        -> Result<(), BackendError>;

    async fn delete_metric(&self, id: &str) -> Result<(), BackendError>;

    async fn delete_all(&self) -> Result<(), BackendError>;

    async fn fetch_refresh_interval(&self) -> Result<RefreshInterval, BackendError>;

    async fn save_refresh_interval(&self, interval: RefreshInterval) -> Result<(), BackendError>;
}

/// [`ConfigBackend`] over the dashboard's REST API.
///
/// | operation               | request                               |
/// |-------------------------|---------------------------------------|
/// | `fetch_metrics`         | `GET {api}/metrics-config`            |
/// | `save_metrics`          | `POST {api}/metrics-config`           |
/// | `create_metric`         | `POST {api}/metrics`                  |
/// | `update_metric`         | `PUT {api}/metrics/{id}`              |
/// | `delete_metric`         | `DELETE {api}/metrics/{id}`           |
/// | `delete_all`            | `DELETE {api}/metrics`                |
/// | `fetch_refresh_interval`| `GET {api}/settings/refresh-interval` |
/// | `save_refresh_interval` | `POST {api}/settings/refresh-interval`|
#[derive(Debug, Clone)]
pub struct HttpConfigBackend {
    client: Client,
    api_url: String,
}

impl HttpConfigBackend {
    /// Create a backend with its own client.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create a backend sharing an existing client.
    pub fn with_client(client: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}

fn check(method: &'static str, response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BackendError::Status {
            method,
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

/// The interval endpoint answers with either a bare number or `{ "interval": n }`.
pub(crate) fn parse_interval(body: &Value) -> Result<RefreshInterval, BackendError> {
    body.as_u64()
        .or_else(|| body.get("interval").and_then(Value::as_u64))
        .map(RefreshInterval::from_millis)
        .ok_or_else(|| BackendError::Decode(format!("refresh interval: {body}")))
}

#[async_trait]
impl ConfigBackend for HttpConfigBackend {
    async fn fetch_metrics(&self) -> Result<Vec<MetricConfig>, BackendError> {
        let response = self.client.get(self.url("metrics-config")).send().await?;
        let body: Option<Vec<MetricConfig>> = check("GET", response)?.json().await?;
        Ok(body.unwrap_or_default())
    }

    async fn save_metrics(&self, metrics: &[MetricConfig]) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("metrics-config"))
            .json(metrics)
            .send()
            .await?;
        check("POST", response)?;
        Ok(())
    }

    async fn create_metric(&self, metric: &MetricConfig) -> Result<(), BackendError> {
        let response = self.client.post(self.url("metrics")).json(metric).send().await?;
        check("POST", response)?;
        Ok(())
    }

    async fn update_metric(
        &self,
        id: &str,
        patch: &MetricConfigPatch,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .put(self.url(&format!("metrics/{id}")))
            .json(patch)
            .send()
            .await?;
        check("PUT", response)?;
        Ok(())
    }

    async fn delete_metric(&self, id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.url(&format!("metrics/{id}")))
            .send()
            .await?;
        check("DELETE", response)?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), BackendError> {
        let response = self.client.delete(self.url("metrics")).send().await?;
        check("DELETE", response)?;
        Ok(())
    }

    async fn fetch_refresh_interval(&self) -> Result<RefreshInterval, BackendError> {
        let response = self
            .client
            .get(self.url("settings/refresh-interval"))
            .send()
            .await?;
        let body: Value = check("GET", response)?.json().await?;
        parse_interval(&body)
    }

    async fn save_refresh_interval(&self, interval: RefreshInterval) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("settings/refresh-interval"))
            .json(&json!({ "interval": interval.as_millis() }))
            .send()
            .await?;
        check("POST", response)?;
        Ok(())
    }
}
