use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::MoadianError;
use super::invoice_id::InvoiceId;
use crate::invoice::Invoice;

/// Packet types understood by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// Invoice submission, schema version 1.
    #[serde(rename = "INVOICE.V01")]
    Invoice,
    #[serde(rename = "GET_TOKEN")]
    GetToken,
    #[serde(rename = "INQUIRY_BY_REFERENCE_NUMBER")]
    InquiryByReferenceNumber,
    #[serde(rename = "GET_ECONOMIC_CODE_INFORMATION")]
    EconomicCodeInformation,
    #[serde(rename = "GET_FISCAL_INFORMATION")]
    FiscalInformation,
}

impl PacketType {
    /// Wire code of the packet type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "INVOICE.V01",
            Self::GetToken => "GET_TOKEN",
            Self::InquiryByReferenceNumber => "INQUIRY_BY_REFERENCE_NUMBER",
            Self::EconomicCodeInformation => "GET_ECONOMIC_CODE_INFORMATION",
            Self::FiscalInformation => "GET_FISCAL_INFORMATION",
        }
    }
}

/// One unit of submission: a payload plus the metadata that is signed with it.
///
/// Packets are immutable; the payload is captured as JSON at construction so
/// the bytes that get signed are exactly the bytes that get encrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    uid: Uuid,
    packet_type: PacketType,
    invoice_id: Option<InvoiceId>,
    created_at: DateTime<Utc>,
    retry: bool,
    data: Value,
}

/// Borrowed view serialized as the canonical form.
///
/// Fields are declared in key order; `serde_json::Value` keeps nested object
/// keys sorted, so the output is fully ordered.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalPacket<'a> {
    created_at: i64,
    data: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_id: Option<&'a str>,
}

impl Packet {
    /// Create an invoice packet from any serializable payload.
    pub fn new(
        invoice_id: InvoiceId,
        payload: &impl Serialize,
        created_at: DateTime<Utc>,
    ) -> Result<Self, MoadianError> {
        Ok(Self {
            uid: Uuid::new_v4(),
            packet_type: PacketType::Invoice,
            invoice_id: Some(invoice_id),
            created_at,
            retry: false,
            data: to_payload(payload)?,
        })
    }

    /// Create the invoice packet for a typed [`Invoice`], taking the id and
    /// creation time from its header.
    pub fn from_invoice(invoice: &Invoice) -> Result<Self, MoadianError> {
        let created_at =
            DateTime::from_timestamp_millis(invoice.header.indatim).ok_or_else(|| {
                MoadianError::InvalidArgument(format!(
                    "invoice time {} is out of range",
                    invoice.header.indatim
                ))
            })?;
        Self::new(invoice.header.taxid.clone(), invoice, created_at)
    }

    /// Non-invoice packet (token handshake, inquiries) stamped with the
    /// current time.
    pub(crate) fn control(
        packet_type: PacketType,
        payload: &impl Serialize,
    ) -> Result<Self, MoadianError> {
        Ok(Self {
            uid: Uuid::new_v4(),
            packet_type,
            invoice_id: None,
            created_at: Utc::now(),
            retry: false,
            data: to_payload(payload)?,
        })
    }

    /// Mark the packet as a resubmission of an earlier attempt.
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn invoice_id(&self) -> Option<&InvoiceId> {
        self.invoice_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_retry(&self) -> bool {
        self.retry
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The deterministic byte form that is both signed and encrypted.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, MoadianError> {
        let canonical = CanonicalPacket {
            created_at: self.created_at.timestamp_millis(),
            data: &self.data,
            invoice_id: self.invoice_id.as_ref().map(InvoiceId::as_str),
        };
        serde_json::to_vec(&canonical)
            .map_err(|e| MoadianError::InvalidArgument(format!("packet not serializable: {e}")))
    }
}

fn to_payload(payload: &impl Serialize) -> Result<Value, MoadianError> {
    serde_json::to_value(payload)
        .map_err(|e| MoadianError::InvalidArgument(format!("payload not serializable: {e}")))
}
