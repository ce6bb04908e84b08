//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `METRICWATCH_`. Nested keys use a
//! double underscore, e.g. `METRICWATCH_KIBANA__URL` or
//! `METRICWATCH_WEATHER__API_KEY`.
//!
//! ```toml
//! api_url = "http://localhost:3001/api"
//! local_store_dir = ".metricwatch"
//! request_timeout_ms = 10000
//!
//! [kibana]
//! url = "http://localhost:5601"
//! time_range = "15m"
//!
//! [weather]
//! api_key = "..."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use metricwatch_adapters::{AdapterError, DataSourceAdapter};

use crate::store::{BackendError, ConfigStore, FileKeyValueStore, HttpConfigBackend};

const ENV_PREFIX: &str = "METRICWATCH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the configuration backend.
    pub api_url: String,
    /// Directory holding the local fallback copy.
    pub local_store_dir: PathBuf,
    /// Timeout for every outbound HTTP request.
    pub request_timeout_ms: u64,
    /// Log filter directive; overrides `RUST_LOG` when set.
    pub log_level: Option<String>,
    pub kibana: KibanaSettings,
    pub database: DatabaseSettings,
    pub weather: WeatherSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KibanaSettings {
    pub url: String,
    pub api_path: String,
    /// Look-back window, e.g. `15m`.
    pub time_range: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub api_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub url: String,
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001/api".to_string(),
            local_store_dir: PathBuf::from(".metricwatch"),
            request_timeout_ms: 10_000,
            log_level: None,
            kibana: KibanaSettings::default(),
            database: DatabaseSettings::default(),
            weather: WeatherSettings::default(),
        }
    }
}

impl Default for KibanaSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:5601".to_string(),
            api_path: "/api/console/proxy".to_string(),
            time_range: "15m".to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001".to_string(),
            api_path: "/api/query".to_string(),
        }
    }
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: None,
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the process environment.
    ///
    /// An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder.add_source(env).build()?.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build the data-source adapter these settings describe.
    pub fn adapter(&self) -> Result<DataSourceAdapter, AdapterError> {
        let mut builder = DataSourceAdapter::builder()
            .kibana_url(&self.kibana.url)
            .kibana_api_path(&self.kibana.api_path)
            .time_range(&self.kibana.time_range)
            .database_url(&self.database.url)
            .database_api_path(&self.database.api_path)
            .weather_url(&self.weather.url)
            .timeout(self.request_timeout());
        if let Some(key) = &self.weather.api_key {
            builder = builder.weather_api_key(key);
        }
        builder.build()
    }

    /// Build the configuration store: the HTTP backend with a file-backed
    /// local copy.
    pub fn config_store(&self) -> Result<ConfigStore, BackendError> {
        let backend = HttpConfigBackend::new(&self.api_url, self.request_timeout())?;
        let local = FileKeyValueStore::new(&self.local_store_dir);
        Ok(ConfigStore::new(backend, local))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}
