//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when fetching a metric from its data source.
///
/// "No data" is never an error: adapters return an empty series for it.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider answered with a failure status, or the request failed.
    #[error("{0}")]
    Http(String),

    /// The provider's response could not be interpreted.
    #[error("{0}")]
    Parse(String),

    /// The provider rejected our credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The adapter or descriptor is misconfigured.
    #[error("Invalid data source configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use reqwest::Client;
    use tokio::net::TcpListener;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            AdapterError::Http("API error: 503".to_string()).to_string(),
            "API error: 503"
        );
        assert_eq!(AdapterError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            AdapterError::Config("missing key".to_string()).to_string(),
            "Invalid data source configuration: missing key"
        );
    }

    async fn send(client: &Client, url: &str) -> AdapterError {
        client.get(url).send().await.unwrap_err().into()
    }

    #[tokio::test]
    async fn refused_connection_maps_to_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = send(&crate::testing::client(), &format!("http://{addr}/")).await;
        assert!(matches!(err, AdapterError::Connection(_)), "{err:?}");
    }

    #[tokio::test]
    async fn silent_server_maps_to_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let err = send(&client, &format!("http://{addr}/")).await;
        assert!(matches!(err, AdapterError::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_url_maps_to_http() {
        let err = send(&crate::testing::client(), "http://").await;
        assert!(matches!(err, AdapterError::Http(_)), "{err:?}");
    }
}
