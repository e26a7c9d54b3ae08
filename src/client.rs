use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;
use zeroize::Zeroizing;

use crate::api::{
    ClientConfig, Dispatcher, EconomicCodeInfo, FiscalInfo, InquiryResult, Seal, SubmissionAck,
    SyncResponse, TokenManager, TokenStatus, Transport,
};
use crate::core::{
    AuthFailure, InvoiceId, InvoiceIdGenerator, MoadianError, Packet, PacketType, Token,
};
use crate::crypto::KeyMaterial;

/// Client for one taxpayer memory (fiscal identity).
///
/// Construction parses all key material up front, so a built client can only
/// fail on the network or on the authority's say. All methods take `&self`;
/// wrap the client in an `Arc` to share it between threads.
///
/// ```rust,no_run
/// use chrono::Utc;
/// use moadian::InvoiceClient;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let authority_key = std::fs::read_to_string("authority_public.pem")?;
/// let signing_key = std::fs::read_to_string("private_key.pem")?;
///
/// let client = InvoiceClient::builder(
///     &authority_key,
///     &signing_key,
///     "6a2bcd88-a871-4245-a393-2843eafe6e02",
///     "A11216",
/// )
/// .build()?;
///
/// client.get_token()?;
/// let id = client.generate_invoice_id(Utc::now(), 1)?;
/// let packet = moadian::Packet::new(id, &json!({"header": {}}), Utc::now())?;
/// let ack = client.send_invoice(&packet)?;
/// for reference in ack.reference_numbers() {
///     println!("queued as {reference}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct InvoiceClient {
    ids: InvoiceIdGenerator,
    tokens: TokenManager,
    dispatcher: Dispatcher,
}

impl InvoiceClient {
    /// Start configuring a client.
    ///
    /// `public_key` is the authority's encryption key (PEM or bare base64
    /// DER), `private_key_pem` the taxpayer's signing key, `org_key_id` the
    /// authority's id for `public_key`, and `identity` the memory id.
    pub fn builder(
        public_key: &str,
        private_key_pem: &str,
        org_key_id: &str,
        identity: &str,
    ) -> InvoiceClientBuilder {
        InvoiceClientBuilder {
            public_key: public_key.to_string(),
            private_key_pem: Zeroizing::new(private_key_pem.to_string()),
            passphrase: None,
            org_key_id: org_key_id.to_string(),
            identity: identity.to_string(),
            config: ClientConfig::default(),
            timeout: None,
            transport: None,
        }
    }

    /// The normalized (uppercase) memory id.
    pub fn identity(&self) -> &str {
        self.ids.identity()
    }

    pub fn config(&self) -> &ClientConfig {
        self.dispatcher.config()
    }

    /// Perform the token handshake and keep the token for later calls.
    pub fn get_token(&self) -> Result<Arc<Token>, MoadianError> {
        self.tokens.authenticate(&self.dispatcher)
    }

    /// Use a token obtained elsewhere, e.g. cached from an earlier session.
    pub fn set_token(&self, token: Token) {
        self.tokens.adopt(token);
    }

    pub fn token_status(&self) -> TokenStatus {
        self.tokens.status()
    }

    /// Tax id for the invoice numbered `sequence` created at `created_at`.
    pub fn generate_invoice_id(
        &self,
        created_at: DateTime<Utc>,
        sequence: u64,
    ) -> Result<InvoiceId, MoadianError> {
        self.ids.generate(created_at, sequence)
    }

    /// Submit one invoice packet.
    pub fn send_invoice(&self, packet: &Packet) -> Result<SubmissionAck, MoadianError> {
        self.send_invoices(std::slice::from_ref(packet))
    }

    /// Submit a batch of invoice packets in one request.
    ///
    /// Each packet is signed and encrypted independently. Fails with
    /// [`AuthFailure::TokenNotSet`] before any network traffic if no token
    /// is held.
    pub fn send_invoices(&self, packets: &[Packet]) -> Result<SubmissionAck, MoadianError> {
        if packets.is_empty() {
            return Err(MoadianError::InvalidArgument(
                "at least one invoice packet is required".into(),
            ));
        }
        if let Some(packet) = packets
            .iter()
            .find(|packet| packet.packet_type() != PacketType::Invoice)
        {
            return Err(MoadianError::InvalidArgument(format!(
                "packet {} is a {} packet, not an invoice",
                packet.uid(),
                packet.packet_type().code()
            )));
        }

        let ack: SubmissionAck = self.privileged(|dispatcher, token| {
            dispatcher.submit(
                &dispatcher.config().paths.enqueue,
                packets,
                Some(token),
                Seal::FULL,
            )
        })?;
        info!(
            packets = packets.len(),
            queued = ack.reference_numbers().count(),
            "invoices submitted"
        );
        Ok(ack)
    }

    /// Processing state of a previously submitted packet.
    pub fn inquiry_by_reference_number(
        &self,
        reference_number: &str,
    ) -> Result<Vec<InquiryResult>, MoadianError> {
        let reference_number = non_blank("reference number", reference_number)?;
        self.inquire(
            PacketType::InquiryByReferenceNumber,
            |config| &config.paths.inquiry_by_reference,
            json!({ "referenceNumber": [reference_number] }),
        )
    }

    /// Registration details of the taxpayer behind `tax_id`.
    pub fn economic_code_information(
        &self,
        tax_id: &str,
    ) -> Result<EconomicCodeInfo, MoadianError> {
        let tax_id = non_blank("economic code", tax_id)?;
        self.inquire(
            PacketType::EconomicCodeInformation,
            |config| &config.paths.economic_code,
            json!({ "economicCode": tax_id }),
        )
    }

    /// This memory's own registration.
    pub fn fiscal_information(&self) -> Result<FiscalInfo, MoadianError> {
        self.inquire(
            PacketType::FiscalInformation,
            |config| &config.paths.fiscal_information,
            json!({ "memoryId": self.identity() }),
        )
    }

    /// Read-only synchronous call: plain packet, bearer token, `result.data`
    /// decoded as `T`.
    fn inquire<T: DeserializeOwned>(
        &self,
        packet_type: PacketType,
        path: impl Fn(&ClientConfig) -> &String,
        payload: serde_json::Value,
    ) -> Result<T, MoadianError> {
        let packet = Packet::control(packet_type, &payload)?;
        let response: SyncResponse<T> = self.privileged(|dispatcher, token| {
            dispatcher.submit(path(dispatcher.config()), &[packet], Some(token), Seal::PLAIN)
        })?;
        Ok(response.result.data)
    }

    /// Run `call` with the current token; a refusal invalidates that token.
    fn privileged<T>(
        &self,
        call: impl FnOnce(&Dispatcher, &Token) -> Result<T, MoadianError>,
    ) -> Result<T, MoadianError> {
        let token = self.tokens.current_token()?;
        let result = call(&self.dispatcher, &*token);
        if let Err(MoadianError::Authentication(AuthFailure::Rejected { .. })) = &result {
            self.tokens.invalidate(&token);
        }
        result
    }
}

impl std::fmt::Debug for InvoiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceClient")
            .field("identity", &self.identity())
            .field("token_status", &self.token_status())
            .finish_non_exhaustive()
    }
}

fn non_blank<'a>(what: &str, value: &'a str) -> Result<&'a str, MoadianError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MoadianError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}

/// Builder for [`InvoiceClient`].
pub struct InvoiceClientBuilder {
    public_key: String,
    private_key_pem: Zeroizing<String>,
    passphrase: Option<Zeroizing<String>>,
    org_key_id: String,
    identity: String,
    config: ClientConfig,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl InvoiceClientBuilder {
    /// Passphrase of an encrypted PKCS#8 private key.
    pub fn passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = Some(Zeroizing::new(passphrase.to_string()));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Per-request timeout. Must be a whole number of milliseconds; it
    /// overrides the timeout of any [`config`](Self::config).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send requests through `transport` instead of the built-in HTTPS one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(mut self) -> Result<InvoiceClient, MoadianError> {
        if let Some(timeout) = self.timeout {
            self.config.timeout_ms = timeout_millis(timeout)?;
        }
        self.config.validate()?;
        let ids = InvoiceIdGenerator::new(&self.identity)?;
        let keys = KeyMaterial::new(
            &self.public_key,
            &self.private_key_pem,
            self.passphrase.as_deref().map(String::as_str),
            self.org_key_id,
        )?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.config)?,
        };
        let dispatcher = Dispatcher::new(
            self.config,
            transport,
            Arc::new(keys),
            ids.identity(),
        )?;

        Ok(InvoiceClient {
            ids,
            tokens: TokenManager::new(),
            dispatcher,
        })
    }
}

fn timeout_millis(timeout: Duration) -> Result<u64, MoadianError> {
    if timeout.subsec_nanos() % 1_000_000 != 0 {
        return Err(MoadianError::InvalidArgument(format!(
            "timeout {timeout:?} is not a whole number of milliseconds"
        )));
    }
    u64::try_from(timeout.as_millis())
        .map_err(|_| MoadianError::InvalidArgument(format!("timeout {timeout:?} is too long")))
}

#[cfg(feature = "http")]
fn default_transport(config: &ClientConfig) -> Result<Arc<dyn Transport>, MoadianError> {
    Ok(Arc::new(crate::api::HttpTransport::new(&config.user_agent)?))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &ClientConfig) -> Result<Arc<dyn Transport>, MoadianError> {
    Err(MoadianError::InvalidArgument(
        "no transport configured; enable the `http` feature or call .transport()".into(),
    ))
}
