//! HTTP transport seam between the tracker engine and the network.

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::NetworkConfig;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    /// A `200 OK` response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors raised before an HTTP response was received.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild { reason: String },
}

/// Blocking-free HTTP GET used for announce and scrape requests.
#[async_trait]
pub trait TrackerTransport: Send + Sync {
    /// Issues a GET for a fully built URL, query string included.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// - `TransportError::Connection` - DNS, connect or I/O failure
    /// - `TransportError::Timeout` - No complete response in time
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates the HTTP client with the configured timeout, user agent and
    /// redirect limit.
    ///
    /// # Errors
    ///
    /// - `TransportError::ClientBuild` - TLS backend or resolver setup failed
    pub fn new(config: &NetworkConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.tracker_timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| TransportError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TrackerTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let map_error = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                }
            } else {
                TransportError::Connection {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::ok("x").is_success());
        assert!(
            HttpResponse {
                status: 204,
                body: Bytes::new()
            }
            .is_success()
        );
        assert!(
            !HttpResponse {
                status: 404,
                body: Bytes::new()
            }
            .is_success()
        );
    }

    #[test]
    fn test_reqwest_transport_builds_from_config() {
        assert!(ReqwestTransport::new(&NetworkConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let transport = ReqwestTransport::new(&NetworkConfig::default()).unwrap();
        let result = transport.get("http://127.0.0.1:1/announce").await;
        assert!(matches!(
            result,
            Err(TransportError::Connection { .. } | TransportError::Timeout { .. })
        ));
    }
}
