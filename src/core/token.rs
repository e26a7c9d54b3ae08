use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque bearer token issued by the authority.
///
/// The server advertises no expiry. A token stays usable until a downstream
/// call is refused, at which point a fresh one must be obtained.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    value: String,
    issued_at: DateTime<Utc>,
}

impl Token {
    /// Wrap a token value received now.
    pub fn new(value: impl Into<String>) -> Self {
        Self::issued(value, Utc::now())
    }

    /// Wrap a token value with an explicit issue time.
    pub fn issued(value: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// `Authorization` header value.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"***")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
