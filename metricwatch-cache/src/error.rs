//! Error types for the cache.

use std::time::Duration;

use thiserror::Error;

/// Why a metric could not be served.
///
/// Cloneable so one fetch outcome can be delivered to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    /// The fetch for this metric failed. Nothing was cached.
    #[error("Failed to fetch metric '{id}': {message}")]
    Fetch { id: String, message: String },

    /// No data came back for this metric: the batch failed as a whole, or
    /// the fetcher did not report on it.
    #[error("No data for metric '{id}': {reason}")]
    Unavailable { id: String, reason: String },

    /// Waiting on another caller's in-flight fetch took too long.
    ///
    /// The fetch itself keeps running and may still populate the cache.
    #[error("Loading metric data timed out after {waited:?} (metric '{id}')")]
    Timeout { id: String, waited: Duration },
}

impl CacheError {
    /// The metric the error concerns.
    pub fn metric_id(&self) -> &str {
        match self {
            CacheError::Fetch { id, .. }
            | CacheError::Unavailable { id, .. }
            | CacheError::Timeout { id, .. } => id,
        }
    }

    /// A message suitable for an error snapshot.
    pub fn message(&self) -> String {
        match self {
            CacheError::Fetch { message, .. } => message.clone(),
            CacheError::Unavailable { reason, .. } => reason.clone(),
            CacheError::Timeout { .. } => "Loading metric data timed out".to_string(),
        }
    }
}

/// A batch fetch that failed as a whole.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FetchError(pub String);

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
