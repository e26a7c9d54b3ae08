use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::MoadianError;

/// Production endpoint of the tax authority.
pub const DEFAULT_BASE_URL: &str = "https://tp.tax.gov.ir";

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Relative paths of the authority's endpoints, joined onto
/// [`ClientConfig::base_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub token: String,
    pub enqueue: String,
    pub inquiry_by_reference: String,
    pub economic_code: String,
    pub fiscal_information: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            token: "req/api/self-tsp/sync/GET_TOKEN".into(),
            enqueue: "req/api/self-tsp/async/normal-enqueue".into(),
            inquiry_by_reference: "req/api/self-tsp/sync/INQUIRY_BY_REFERENCE_NUMBER".into(),
            economic_code: "req/api/self-tsp/sync/GET_ECONOMIC_CODE_INFORMATION".into(),
            fiscal_information: "req/api/self-tsp/sync/GET_FISCAL_INFORMATION".into(),
        }
    }
}

/// Connection settings for an [`InvoiceClient`](crate::InvoiceClient).
///
/// Every field has a default, so a partial JSON document (or `{}`) is a valid
/// configuration.
///
/// ```rust
/// use moadian::api::ClientConfig;
///
/// let config: ClientConfig =
///     serde_json::from_str(r#"{"base_url": "https://sandboxrc.tax.gov.ir/"}"#).unwrap();
/// assert_eq!(
///     config.endpoint(&config.paths.token),
///     "https://sandboxrc.tax.gov.ir/req/api/self-tsp/sync/GET_TOKEN"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    pub user_agent: String,
    pub paths: EndpointPaths,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: concat!("moadian-rs/", env!("CARGO_PKG_VERSION")).into(),
            paths: EndpointPaths::default(),
        }
    }
}

impl ClientConfig {
    /// Reject settings that can never produce a working request.
    pub fn validate(&self) -> Result<(), MoadianError> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            MoadianError::InvalidArgument(format!("invalid base url '{}': {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MoadianError::InvalidArgument(format!(
                "base url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(MoadianError::InvalidArgument(
                "timeout must be at least one millisecond".into(),
            ));
        }
        let paths = [
            ("token", &self.paths.token),
            ("enqueue", &self.paths.enqueue),
            ("inquiry_by_reference", &self.paths.inquiry_by_reference),
            ("economic_code", &self.paths.economic_code),
            ("fiscal_information", &self.paths.fiscal_information),
        ];
        for (name, path) in paths {
            if path.trim_matches('/').is_empty() {
                return Err(MoadianError::InvalidArgument(format!(
                    "endpoint path '{name}' is empty"
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute URL for `path`, with exactly one slash at the seam.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_production() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.endpoint(&config.paths.enqueue),
            "https://tp.tax.gov.ir/req/api/self-tsp/async/normal-enqueue"
        );
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn endpoint_joins_with_single_slash() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/".into(),
            ..ClientConfig::default()
        };
        assert_eq!(config.endpoint("/a/b"), "http://localhost:8080/a/b");
        assert_eq!(config.endpoint("a/b"), "http://localhost:8080/a/b");
    }

    #[test]
    fn rejects_bad_settings() {
        let bad_url = ClientConfig {
            base_url: "not a url".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            bad_url.validate(),
            Err(MoadianError::InvalidArgument(_))
        ));

        let ftp = ClientConfig {
            base_url: "ftp://tp.tax.gov.ir".into(),
            ..ClientConfig::default()
        };
        assert!(ftp.validate().is_err());

        let no_timeout = ClientConfig {
            timeout_ms: 0,
            ..ClientConfig::default()
        };
        assert!(no_timeout.validate().is_err());

        let mut empty_path = ClientConfig::default();
        empty_path.paths.token = "/".into();
        assert!(empty_path.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"timeout_ms": 1500}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.paths, EndpointPaths::default());
    }
}
