use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::config::ClientConfig;
use super::envelope::{Envelope, Seal};
use super::responses::ErrorBody;
use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::core::{AuthFailure, MoadianError, Packet, RequestContext, Token};
use crate::crypto::{EncryptionEngine, KeyMaterial, SignatureEngine};

/// Longest slice of an unstructured error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct RequestBody<'a> {
    packets: &'a [Envelope],
}

/// Seals packets, attaches authentication and correlation headers, and
/// classifies the authority's answer.
///
/// Holds no per-call state; one dispatcher serves any number of threads.
pub struct Dispatcher {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    keys: Arc<KeyMaterial>,
    fiscal_id: String,
    signer: SignatureEngine,
    encryptor: EncryptionEngine,
}

impl Dispatcher {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        keys: Arc<KeyMaterial>,
        fiscal_id: impl Into<String>,
    ) -> Result<Self, MoadianError> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            keys,
            fiscal_id: fiscal_id.into(),
            signer: SignatureEngine,
            encryptor: EncryptionEngine,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn fiscal_id(&self) -> &str {
        &self.fiscal_id
    }

    /// Wire form of one packet under this dispatcher's keys.
    pub fn seal(&self, packet: &Packet, seal: Seal) -> Result<Envelope, MoadianError> {
        Envelope::seal(
            packet,
            &self.fiscal_id,
            &self.keys,
            &self.signer,
            &self.encryptor,
            seal,
        )
    }

    /// Send an authenticated batch to `path` and decode a 2xx answer as `T`.
    ///
    /// Without a token this fails with [`AuthFailure::TokenNotSet`] before
    /// anything is sealed or sent.
    pub fn submit<T: DeserializeOwned>(
        &self,
        path: &str,
        packets: &[Packet],
        token: Option<&Token>,
        seal: Seal,
    ) -> Result<T, MoadianError> {
        let token = token.ok_or(AuthFailure::TokenNotSet)?;
        self.dispatch(path, packets, Some(token), seal)
    }

    /// The one unauthenticated call: the signed, encrypted token request.
    pub(crate) fn handshake<T: DeserializeOwned>(
        &self,
        path: &str,
        packet: &Packet,
    ) -> Result<T, MoadianError> {
        self.dispatch(path, std::slice::from_ref(packet), None, Seal::FULL)
    }

    fn dispatch<T: DeserializeOwned>(
        &self,
        path: &str,
        packets: &[Packet],
        token: Option<&Token>,
        seal: Seal,
    ) -> Result<T, MoadianError> {
        if packets.is_empty() {
            return Err(MoadianError::InvalidArgument(
                "at least one packet is required".into(),
            ));
        }

        let envelopes = packets
            .iter()
            .map(|packet| self.seal(packet, seal))
            .collect::<Result<Vec<_>, _>>()?;
        let body = serde_json::to_vec(&RequestBody {
            packets: &envelopes,
        })
        .map_err(|e| MoadianError::InvalidArgument(format!("request not serializable: {e}")))?;

        let context = RequestContext::fresh();
        let mut headers: Vec<(String, String)> = context
            .headers()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        headers.push(("Content-Type".into(), "application/json".into()));
        headers.push(("Accept".into(), "application/json".into()));
        if let Some(token) = token {
            headers.push(("Authorization".into(), token.bearer()));
        }

        let url = self.config.endpoint(path);
        debug!(
            trace_id = %context.trace_id(),
            url = %url,
            packets = packets.len(),
            "dispatching request"
        );

        let response = self
            .transport
            .post(HttpRequest {
                url,
                headers,
                body,
                timeout: self.config.timeout(),
            })
            .map_err(|e| {
                warn!(trace_id = %context.trace_id(), error = %e, "transport failure");
                MoadianError::from(e)
            })?;

        debug!(
            trace_id = %context.trace_id(),
            status = response.status,
            "response received"
        );
        decode_response(response)
    }
}

/// Classify a completed exchange: 2xx decodes as `T`, 401/403 is a token
/// problem, anything else is a rejection.
pub(crate) fn decode_response<T: DeserializeOwned>(
    response: HttpResponse,
) -> Result<T, MoadianError> {
    let status = response.status;
    if response.is_success() {
        return serde_json::from_slice(&response.body).map_err(|e| {
            MoadianError::Response(format!("cannot decode HTTP {status} body: {e}"))
        });
    }

    let (code, message) = ErrorBody::parse(&response.body)
        .unwrap_or_else(|| (format!("HTTP_{status}"), body_excerpt(&response.body)));

    if matches!(status, 401 | 403) {
        warn!(status, code = %code, "token refused");
        return Err(AuthFailure::Rejected { status, message }.into());
    }

    warn!(status, code = %code, "request rejected");
    Err(MoadianError::RemoteRejection {
        status,
        code,
        message,
    })
}

fn body_excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .trim()
        .chars()
        .take(MAX_ERROR_BODY)
        .collect()
}
