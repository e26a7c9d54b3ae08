//! Typed views of the authority's JSON responses.
//!
//! The authority adds fields without notice, so every result keeps unknown
//! keys in an `extra` map instead of failing to decode.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Wrapper around every synchronous endpoint's answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse<T> {
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub result: SyncResult<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult<T> {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub packet_type: Option<String>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenData {
    pub(crate) token: String,
}

/// A code/message pair as the authority reports errors and warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RemoteMessage {
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().or(self.error_code.as_deref())
    }
}

/// Answer of the asynchronous enqueue endpoint: one receipt per packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub result: Vec<PacketReceipt>,
}

impl SubmissionAck {
    /// Reference numbers to poll with
    /// [`InvoiceClient::inquiry_by_reference_number`](crate::InvoiceClient::inquiry_by_reference_number).
    pub fn reference_numbers(&self) -> impl Iterator<Item = &str> {
        self.result
            .iter()
            .filter_map(|receipt| receipt.reference_number.as_deref())
    }

    pub fn all_accepted(&self) -> bool {
        self.result.iter().all(PacketReceipt::is_accepted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketReceipt {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub errors: Vec<RemoteMessage>,
}

impl PacketReceipt {
    /// Queued for processing. Acceptance of the invoice itself is only known
    /// after an inquiry.
    pub fn is_accepted(&self) -> bool {
        self.reference_number.is_some() && self.error_code.is_none() && self.errors.is_empty()
    }
}

/// Processing state of one submitted packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryResult {
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    /// `SUCCESS`, `FAILED`, `PENDING`, `IN_PROGRESS`, or `NOT_FOUND`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub packet_type: Option<String>,
    #[serde(default)]
    pub fiscal_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InquiryResult {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("SUCCESS")
    }

    /// Still queued or being processed; ask again later.
    pub fn is_pending(&self) -> bool {
        matches!(self.status.as_deref(), Some("PENDING" | "IN_PROGRESS"))
    }

    /// Validation errors reported under `data.error`.
    pub fn errors(&self) -> Vec<RemoteMessage> {
        self.messages("error")
    }

    pub fn warnings(&self) -> Vec<RemoteMessage> {
        self.messages("warning")
    }

    fn messages(&self, key: &str) -> Vec<RemoteMessage> {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(|list| serde_json::from_value(list.clone()).ok())
            .unwrap_or_default()
    }
}

/// Registration details behind an economic code (taxpayer id).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicCodeInfo {
    #[serde(default)]
    pub name_trade: Option<String>,
    #[serde(default)]
    pub taxpayer_status: Option<String>,
    #[serde(default)]
    pub taxpayer_type: Option<String>,
    #[serde(default, rename = "postalcodeTaxpayer")]
    pub postal_code: Option<String>,
    #[serde(default, rename = "addressTaxpayer")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub national_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The calling memory's own registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalInfo {
    #[serde(default)]
    pub name_trade: Option<String>,
    #[serde(default)]
    pub fiscal_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub economic_code: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub sale_threshold: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shapes seen in non-2xx bodies: `{"errors":[{code,message}]}` or flat
/// `{"code"|"error", "message"}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    errors: Vec<RemoteMessage>,
    #[serde(default, deserialize_with = "lenient_string")]
    code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    /// First code and message found, if the body is structured at all.
    pub(crate) fn parse(body: &[u8]) -> Option<(String, String)> {
        let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
        if let Some(first) = parsed.errors.first() {
            if let Some(code) = first.code() {
                return Some((code.to_string(), first.message.clone().unwrap_or_default()));
            }
        }
        let code = parsed.code.or(parsed.error)?;
        Some((code, parsed.message.unwrap_or_default()))
    }
}

/// Codes arrive as strings or numbers depending on the endpoint.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn submission_ack_lists_references() {
        let ack: SubmissionAck = serde_json::from_str(
            r#"{"timestamp": 1710489600000, "result": [
                {"uid": "a", "referenceNumber": "ref-1", "errorCode": null, "errors": []},
                {"uid": "b", "referenceNumber": null, "errorCode": 4010,
                 "errors": [{"code": "010301", "message": "bad taxid"}]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(ack.reference_numbers().collect::<Vec<_>>(), vec!["ref-1"]);
        assert!(ack.result[0].is_accepted());
        assert!(!ack.all_accepted());
        assert_eq!(ack.result[1].error_code.as_deref(), Some("4010"));
        assert_eq!(ack.result[1].errors[0].code(), Some("010301"));
    }

    #[test]
    fn inquiry_keeps_unknown_fields() {
        let results: Vec<InquiryResult> = serde_json::from_str(
            r#"[{"referenceNumber": "ref-1", "status": "FAILED", "sign": "xyz",
                 "data": {"error": [{"code": "0100", "message": "wrong total"}],
                          "warning": [], "success": false}}]"#,
        )
        .unwrap();
        let result = &results[0];

        assert!(!result.is_success());
        assert!(!result.is_pending());
        assert_eq!(result.extra["sign"], "xyz");
        assert_eq!(result.errors()[0].message.as_deref(), Some("wrong total"));
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn economic_and_fiscal_info_decode() {
        let info: EconomicCodeInfo = serde_json::from_str(
            r#"{"nameTrade": "ACME", "taxpayerStatus": "ACTIVE",
                "postalcodeTaxpayer": "1234567890", "nationalId": 10101010101,
                "vatStatus": "REGISTERED"}"#,
        )
        .unwrap();
        assert_eq!(info.name_trade.as_deref(), Some("ACME"));
        assert_eq!(info.postal_code.as_deref(), Some("1234567890"));
        assert_eq!(info.national_id.as_deref(), Some("10101010101"));
        assert_eq!(info.extra["vatStatus"], "REGISTERED");

        let fiscal: FiscalInfo = serde_json::from_str(
            r#"{"nameTrade": "ACME", "fiscalStatus": "ACTIVE", "saleThreshold": 5000000}"#,
        )
        .unwrap();
        assert_eq!(fiscal.sale_threshold, Some(dec!(5000000)));
        assert!(fiscal.extra.is_empty());
    }

    #[test]
    fn error_body_shapes() {
        assert_eq!(
            ErrorBody::parse(br#"{"errors":[{"code":"010301","message":"invalid taxid"}]}"#),
            Some(("010301".into(), "invalid taxid".into()))
        );
        assert_eq!(
            ErrorBody::parse(br#"{"code": 42, "message": "quota"}"#),
            Some(("42".into(), "quota".into()))
        );
        assert_eq!(
            ErrorBody::parse(br#"{"error": "invalid_request"}"#),
            Some(("invalid_request".into(), String::new()))
        );
        assert_eq!(ErrorBody::parse(b"<html>Bad Gateway</html>"), None);
        assert_eq!(ErrorBody::parse(br#"{"unrelated": true}"#), None);
    }
}
