//! Raw HTTP access behind a small trait.
//!
//! The fetch client only needs "GET this URL, give me status and body";
//! keeping that behind [`Transport`] lets tests script responses.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use thiserror::Error;

use crate::config::ClientConfig;
use crate::error::{KinGraphError, Result};

/// Status code and body text of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A request that never produced a response (connect, timeout, TLS, ...).
/// Always treated as transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Blocking GET.
pub trait Transport {
    fn get(&mut self, url: &str) -> std::result::Result<RawResponse, TransportError>;
}

/// `reqwest` blocking client with the configured timeout and User-Agent.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| KinGraphError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(&mut self, url: &str) -> std::result::Result<RawResponse, TransportError> {
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        assert!(HttpTransport::new(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let config = ClientConfig {
            request_timeout_secs: 2,
            ..ClientConfig::default()
        };
        let mut transport = HttpTransport::new(&config).unwrap();
        let err = transport.get("http://127.0.0.1:1/kitties/1").unwrap_err();
        assert!(!err.0.is_empty());
    }
}
