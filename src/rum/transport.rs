//! Transport seam
//!
//! Every network call the engine makes goes through [`Transport`], so the
//! host can supply its own HTTP stack. [`HttpTransport`] is the default,
//! backed by reqwest.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::RumSettings;

/// A single outbound request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportRequest {
    /// Plain GET with no headers and no body
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Errors surfaced by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Cancellation token fired before or during the call
    Canceled,
    /// Connection, TLS, timeout or body read failure
    Request(String),
    /// Server answered with a non-success status
    Status(u16),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canceled => write!(f, "request canceled"),
            Self::Request(msg) => write!(f, "request failed: {}", msg),
            Self::Status(code) => write!(f, "unexpected HTTP status {}", code),
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request, returning the response body on success
    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &RumSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(settings.user_agent.clone())
            .build()
            .context("Failed to build HttpTransport client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Canceled);
        }

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let exchange = async {
            let resp = builder
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }

            resp.text()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url = %request.url, "request abandoned on cancel");
                Err(TransportError::Canceled)
            }
            result = exchange => result,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_request_has_no_body() {
        let req = TransportRequest::get("http://example.test/x");
        assert_eq!(req.method, Method::GET);
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[tokio::test]
    async fn test_http_transport_short_circuits_when_canceled() {
        let transport = HttpTransport::new(&RumSettings::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Never reaches the network: the token is checked first
        let err = transport
            .send(TransportRequest::get("http://127.0.0.1:9/unused"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Canceled);
    }
}
