use std::time::Duration;

use thiserror::Error;

use crate::core::MoadianError;

/// A fully prepared outbound POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// First header value with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and raw body of a completed exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The exchange never completed: DNS, connect, TLS, timeout, or a broken body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<TransportError> for MoadianError {
    fn from(err: TransportError) -> Self {
        MoadianError::Network(err.0)
    }
}

/// Carries one request to the authority and returns its response.
///
/// Implementations must return non-2xx responses as `Ok`; only a failure to
/// complete the exchange is a [`TransportError`]. The request's `timeout`
/// bounds the whole exchange.
pub trait Transport: Send + Sync {
    fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking HTTPS transport on a shared connection pool.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, MoadianError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| MoadianError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest {
            url: "https://tp.tax.gov.ir/x".into(),
            headers: vec![("requestTraceId".into(), "abc".into())],
            body: Vec::new(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(request.header("requesttraceid"), Some("abc"));
        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn transport_errors_become_network_errors() {
        let err: MoadianError = TransportError("connection refused".into()).into();
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn success_range() {
        let response = |status| HttpResponse {
            status,
            body: Vec::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(500).is_success());
    }
}
