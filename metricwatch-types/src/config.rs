//! Metric definitions and data-source descriptors.

use core::fmt;

use crate::RefreshInterval;

/// A monitored metric as defined by an operator.
///
/// `ucl`/`lcl` bound the normal range. `critical_threshold` is a second,
/// more severe limit; `None` means the metric has no critical rule at all.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricConfig {
    /// Stable unique identifier. Empty until the store assigns one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Free-form description.
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,

    /// Unit label (e.g. "ms", "%").
    #[cfg_attr(feature = "serde", serde(default))]
    pub unit: String,

    /// Upper control limit.
    pub ucl: f64,

    /// Lower control limit.
    pub lcl: f64,

    /// Critical threshold, if any.
    #[cfg_attr(feature = "serde", serde(default))]
    pub critical_threshold: Option<f64>,

    /// Where the metric's values come from.
    pub data_source: DataSource,
}

impl MetricConfig {
    /// Create a builder for a metric definition.
    pub fn builder(name: impl Into<String>) -> MetricConfigBuilder {
        MetricConfigBuilder::new(name)
    }

    /// The metric's refresh interval (and freshness window).
    pub fn refresh_interval(&self) -> RefreshInterval {
        self.data_source.refresh_interval
    }

    /// Apply a partial update, replacing every field the patch sets.
    pub fn apply(&mut self, patch: &MetricConfigPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(ucl) = patch.ucl {
            self.ucl = ucl;
        }
        if let Some(lcl) = patch.lcl {
            self.lcl = lcl;
        }
        if let Some(critical) = patch.critical_threshold {
            self.critical_threshold = critical;
        }
        if let Some(data_source) = &patch.data_source {
            self.data_source = data_source.clone();
        }
    }

    /// Return a copy with the patch applied.
    pub fn patched(&self, patch: &MetricConfigPatch) -> Self {
        let mut updated = self.clone();
        updated.apply(patch);
        updated
    }
}

/// A partial update to a [`MetricConfig`].
///
/// `critical_threshold` is three-state: `None` leaves it alone,
/// `Some(None)` clears it and `Some(Some(v))` sets it.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricConfigPatch {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub unit: Option<String>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub ucl: Option<f64>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub lcl: Option<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "present_or_null"
        )
    )]
    pub critical_threshold: Option<Option<f64>>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub data_source: Option<DataSource>,
}

impl MetricConfigPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// A field that is present maps to `Some`, even when its value is `null`.
#[cfg(feature = "serde")]
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    Option::<f64>::deserialize(deserializer).map(Some)
}

/// Descriptor of the provider a metric is read from.
///
/// On the wire this is a flat object tagged by `type`; see [`SourceKind`]
/// for the variants.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "wire::RawDataSource", into = "wire::RawDataSource")
)]
pub struct DataSource {
    /// How often to refresh, and how long a fetched value stays fresh.
    pub refresh_interval: RefreshInterval,
    /// Provider-specific payload.
    pub kind: SourceKind,
}

impl DataSource {
    /// Create a descriptor with the default refresh interval.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            refresh_interval: RefreshInterval::DEFAULT,
            kind,
        }
    }

    /// Log-search query whose response shape is inferred from the query text.
    pub fn kibana(query: impl Into<String>) -> Self {
        Self::new(SourceKind::Kibana {
            query: query.into(),
            response: None,
        })
    }

    /// Raw database query.
    pub fn database(query: impl Into<String>) -> Self {
        Self::new(SourceKind::Database {
            query: query.into(),
        })
    }

    /// Generic HTTP GET of a JSON endpoint.
    pub fn api(url: impl Into<String>) -> Self {
        Self::new(SourceKind::Api {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
        })
    }

    /// Weather provider lookup for a city.
    pub fn weather(city: impl Into<String>, metric: WeatherMetric) -> Self {
        Self::new(SourceKind::WeatherApi {
            city: city.into(),
            metric,
        })
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: RefreshInterval) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// Provider-specific part of a [`DataSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Log-search (Kibana console proxy) query.
    Kibana {
        query: String,
        /// Declared response shape. When `None` it is inferred from `query`.
        response: Option<KibanaResponse>,
    },
    /// Query submitted to the database query endpoint.
    Database { query: String },
    /// Arbitrary JSON endpoint. `url` travels as `query` on the wire.
    Api {
        url: String,
        method: HttpMethod,
        /// JSON text sent for POST and PUT requests.
        body: Option<String>,
    },
    /// Weather provider (current conditions plus forecast).
    WeatherApi { city: String, metric: WeatherMetric },
    /// A `type` tag this version does not know. Fetches yield no data.
    Unrecognized {
        kind: String,
        query: Option<String>,
    },
}

impl SourceKind {
    /// The `type` tag used on the wire.
    pub fn type_name(&self) -> &str {
        match self {
            SourceKind::Kibana { .. } => "kibana",
            SourceKind::Database { .. } => "database",
            SourceKind::Api { .. } => "api",
            SourceKind::WeatherApi { .. } => "weather_api",
            SourceKind::Unrecognized { kind, .. } => kind,
        }
    }

    /// The query text for query-driven sources.
    pub fn query(&self) -> Option<&str> {
        match self {
            SourceKind::Kibana { query, .. } | SourceKind::Database { query } => Some(query),
            SourceKind::Api { url, .. } => Some(url),
            SourceKind::Unrecognized { query, .. } => query.as_deref(),
            SourceKind::WeatherApi { .. } => None,
        }
    }
}

/// Shape of a log-search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum KibanaResponse {
    /// `aggregations.average.value` scalar.
    Aggregation,
    /// `hits.total.value` scalar.
    Count,
    /// `hits.hits[]` documents.
    Documents,
}

impl KibanaResponse {
    /// Infer the response shape from the query text.
    ///
    /// Substring sniffing: `avg(` wins over `count(`, anything else is
    /// treated as a raw document search.
    pub fn infer(query: &str) -> Self {
        if query.contains("avg(") {
            KibanaResponse::Aggregation
        } else if query.contains("count(") {
            KibanaResponse::Count
        } else {
            KibanaResponse::Documents
        }
    }
}

/// HTTP method for [`SourceKind::Api`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Whether requests with this method carry a body.
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

/// Which weather reading a weather metric tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WeatherMetric {
    Temperature,
    Humidity,
    WindSpeed,
    Pressure,
    /// Anything else; kept verbatim so it round-trips, projects to zero.
    Unsupported(String),
}

impl WeatherMetric {
    /// The wire name of this metric type.
    pub fn as_str(&self) -> &str {
        match self {
            WeatherMetric::Temperature => "temperature",
            WeatherMetric::Humidity => "humidity",
            WeatherMetric::WindSpeed => "wind_speed",
            WeatherMetric::Pressure => "pressure",
            WeatherMetric::Unsupported(other) => other,
        }
    }

    /// Whether this is one of the readings the weather adapter projects.
    pub fn is_supported(&self) -> bool {
        !matches!(self, WeatherMetric::Unsupported(_))
    }
}

impl From<&str> for WeatherMetric {
    fn from(s: &str) -> Self {
        match s {
            "temperature" => WeatherMetric::Temperature,
            "humidity" => WeatherMetric::Humidity,
            "wind_speed" => WeatherMetric::WindSpeed,
            "pressure" => WeatherMetric::Pressure,
            other => WeatherMetric::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for WeatherMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for [`MetricConfig`].
#[derive(Debug)]
pub struct MetricConfigBuilder {
    id: String,
    name: String,
    description: String,
    unit: String,
    ucl: f64,
    lcl: f64,
    critical_threshold: Option<f64>,
    data_source: Option<DataSource>,
}

impl MetricConfigBuilder {
    /// Create a new builder. Limits default to `[0, 100]`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            ucl: 100.0,
            lcl: 0.0,
            critical_threshold: None,
            data_source: None,
        }
    }

    /// Set the identifier.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the unit label.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the lower and upper control limits.
    pub fn limits(mut self, lcl: f64, ucl: f64) -> Self {
        self.lcl = lcl;
        self.ucl = ucl;
        self
    }

    /// Set the critical threshold.
    pub fn critical(mut self, threshold: f64) -> Self {
        self.critical_threshold = Some(threshold);
        self
    }

    /// Set the data source.
    pub fn source(mut self, data_source: DataSource) -> Self {
        self.data_source = Some(data_source);
        self
    }

    /// Build the metric. Without a source, an empty log-search query is used.
    pub fn build(self) -> MetricConfig {
        MetricConfig {
            id: self.id,
            name: self.name,
            description: self.description,
            unit: self.unit,
            ucl: self.ucl,
            lcl: self.lcl,
            critical_threshold: self.critical_threshold,
            data_source: self
                .data_source
                .unwrap_or_else(|| DataSource::kibana(String::new())),
        }
    }
}

#[cfg(feature = "serde")]
mod wire {
    //! Flat `{type, query, refreshInterval, params}` representation.

    use super::{DataSource, HttpMethod, KibanaResponse, SourceKind, WeatherMetric};
    use crate::RefreshInterval;

    #[derive(serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct RawDataSource {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default)]
        refresh_interval: Option<RefreshInterval>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<RawWeatherParams>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_shape: Option<KibanaResponse>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<HttpMethod>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawWeatherParams {
        #[serde(default)]
        city: String,
        #[serde(default)]
        metric_type: String,
    }

    impl From<RawDataSource> for DataSource {
        fn from(raw: RawDataSource) -> Self {
            let query = raw.query.unwrap_or_default();
            let kind = match raw.kind.as_str() {
                "kibana" => SourceKind::Kibana {
                    query,
                    response: raw.response_shape,
                },
                "database" => SourceKind::Database { query },
                "api" => SourceKind::Api {
                    url: query,
                    method: raw.method.unwrap_or_default(),
                    body: raw.body,
                },
                "weather_api" => {
                    let params = raw.params.unwrap_or(RawWeatherParams {
                        city: String::new(),
                        metric_type: String::new(),
                    });
                    SourceKind::WeatherApi {
                        city: params.city,
                        metric: WeatherMetric::from(params.metric_type.as_str()),
                    }
                }
                _ => SourceKind::Unrecognized {
                    kind: raw.kind,
                    query: Some(query).filter(|q| !q.is_empty()),
                },
            };

            DataSource {
                refresh_interval: raw.refresh_interval.unwrap_or_default(),
                kind,
            }
        }
    }

    impl From<DataSource> for RawDataSource {
        fn from(source: DataSource) -> Self {
            let mut raw = RawDataSource {
                kind: source.kind.type_name().to_string(),
                query: None,
                refresh_interval: Some(source.refresh_interval),
                params: None,
                response_shape: None,
                method: None,
                body: None,
            };

            match source.kind {
                SourceKind::Kibana { query, response } => {
                    raw.query = Some(query);
                    raw.response_shape = response;
                }
                SourceKind::Database { query } => raw.query = Some(query),
                SourceKind::Api { url, method, body } => {
                    raw.query = Some(url);
                    raw.method = Some(method).filter(|m| *m != HttpMethod::Get);
                    raw.body = body;
                }
                SourceKind::WeatherApi { city, metric } => {
                    raw.params = Some(RawWeatherParams {
                        city,
                        metric_type: metric.as_str().to_string(),
                    });
                }
                SourceKind::Unrecognized { query, .. } => raw.query = query,
            }

            raw
        }
    }
}
