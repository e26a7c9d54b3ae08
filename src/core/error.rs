use thiserror::Error;

/// Errors that can occur while building, sealing, or dispatching packets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MoadianError {
    /// Malformed identity, out-of-range sequence, or other bad caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The private key failed to load or the sign operation failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// Malformed public key material or a failed encrypt/decrypt.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Missing, rejected, or unobtainable bearer token.
    #[error("authentication error: {0}")]
    Authentication(AuthFailure),

    /// Transport-level failure. The only class worth retrying.
    #[error("network error: {0}")]
    Network(String),

    /// The authority answered with a structured non-2xx rejection.
    #[error("rejected by authority (HTTP {status}) [{code}]: {message}")]
    RemoteRejection {
        /// HTTP status code of the response.
        status: u16,
        /// Authority error code, or `HTTP_<status>` when the body carried none.
        code: String,
        /// Human-readable message from the response body.
        message: String,
    },

    /// A 2xx body that does not decode into the endpoint's result type.
    #[error("unexpected response: {0}")]
    Response(String),
}

impl MoadianError {
    /// Whether the caller may reasonably retry the same request.
    ///
    /// Only transport failures qualify, including a token handshake that
    /// failed in transit. Key problems never heal, and a rejection means the
    /// content itself is wrong.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Authentication(AuthFailure::Handshake {
                    retryable: true,
                    ..
                })
        )
    }
}

/// Why a privileged call could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthFailure {
    /// No token has been obtained yet; no network call was attempted.
    #[error("token not set; call get_token() before sending invoices")]
    TokenNotSet,

    /// Another caller is currently re-authenticating.
    #[error("authentication already in progress")]
    InProgress,

    /// The authority refused the bearer token (HTTP 401/403).
    #[error("token rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The token handshake itself failed. `retryable` is set when the cause
    /// was a transport failure rather than refused credentials.
    #[error("token handshake failed: {message}")]
    Handshake { message: String, retryable: bool },
}

impl From<AuthFailure> for MoadianError {
    fn from(failure: AuthFailure) -> Self {
        Self::Authentication(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(MoadianError::Network("timeout".into()).is_retryable());
        assert!(!MoadianError::Signing("bad key".into()).is_retryable());
        assert!(!MoadianError::Authentication(AuthFailure::TokenNotSet).is_retryable());
        assert!(
            MoadianError::Authentication(AuthFailure::Handshake {
                message: "connection reset".into(),
                retryable: true,
            })
            .is_retryable()
        );
        assert!(
            !MoadianError::RemoteRejection {
                status: 400,
                code: "E001".into(),
                message: "bad".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn rejection_display_carries_code() {
        let err = MoadianError::RemoteRejection {
            status: 422,
            code: "010301".into(),
            message: "invalid taxid".into(),
        };
        assert_eq!(
            err.to_string(),
            "rejected by authority (HTTP 422) [010301]: invalid taxid"
        );
    }
}
