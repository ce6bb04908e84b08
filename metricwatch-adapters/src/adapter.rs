//! The data-source adapter: one entry point over every provider kind.

use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use metricwatch_types::{DataSource, KibanaResponse, Series, SourceKind};

use crate::database::DatabaseEndpoint;
use crate::kibana::KibanaEndpoint;
use crate::weather::WeatherEndpoint;
use crate::{api, database, kibana, weather, AdapterError};

/// Fetches and normalizes time series for any [`DataSource`].
///
/// Cheap to clone; clones share one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct DataSourceAdapter {
    client: Client,
    kibana: KibanaEndpoint,
    database: DatabaseEndpoint,
    weather: WeatherEndpoint,
}

impl DataSourceAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> DataSourceAdapterBuilder {
        DataSourceAdapterBuilder::default()
    }

    /// Fetch the series a data source currently reports.
    ///
    /// Unknown source kinds are not an error: they log a warning and
    /// report no data.
    pub async fn fetch(&self, source: &DataSource) -> Result<Series, AdapterError> {
        match &source.kind {
            SourceKind::Kibana { query, response } => {
                let shape = response.unwrap_or_else(|| KibanaResponse::infer(query));
                kibana::fetch(&self.client, &self.kibana, query, shape).await
            }
            SourceKind::Database { query } => {
                database::fetch(&self.client, &self.database, query).await
            }
            SourceKind::Api { url, method, body } => {
                api::fetch(&self.client, url, *method, body.as_deref()).await
            }
            SourceKind::WeatherApi { city, metric } => {
                weather::fetch(&self.client, &self.weather, city, metric).await
            }
            SourceKind::Unrecognized { kind, .. } => {
                warn!(kind = %kind, "Unknown data source type, reporting no data");
                Ok(Series::empty())
            }
        }
    }
}

/// Builder for DataSourceAdapter.
#[derive(Debug, Default)]
pub struct DataSourceAdapterBuilder {
    kibana: KibanaEndpoint,
    database: DatabaseEndpoint,
    weather: WeatherEndpoint,
    timeout: Option<Duration>,
}

impl DataSourceAdapterBuilder {
    /// Set the log-search base URL (e.g., "http://localhost:5601").
    pub fn kibana_url(mut self, url: impl Into<String>) -> Self {
        self.kibana.url = url.into();
        self
    }

    /// Set the log-search proxy path (default: "/api/console/proxy").
    pub fn kibana_api_path(mut self, path: impl Into<String>) -> Self {
        self.kibana.api_path = path.into();
        self
    }

    /// Set the relative search window (default: "15m").
    pub fn time_range(mut self, range: impl Into<String>) -> Self {
        self.kibana.time_range = range.into();
        self
    }

    /// Set the database API base URL (e.g., "http://localhost:3001").
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database.url = url.into();
        self
    }

    /// Set the database query path (default: "/api/query").
    pub fn database_api_path(mut self, path: impl Into<String>) -> Self {
        self.database.api_path = path.into();
        self
    }

    /// Set the weather provider base URL.
    pub fn weather_url(mut self, url: impl Into<String>) -> Self {
        self.weather.url = url.into();
        self
    }

    /// Set the weather provider API key.
    pub fn weather_api_key(mut self, key: impl Into<String>) -> Self {
        self.weather.api_key = Some(key.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<DataSourceAdapter, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(DataSourceAdapter {
            client,
            kibana: self.kibana,
            database: self.database,
            weather: self.weather,
        })
    }
}
