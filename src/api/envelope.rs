use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::{MoadianError, Packet, PacketType};
use crate::crypto::{
    CONTENT_ALGORITHM, EncryptionEngine, IV_SIZE, KeyMaterial, SIGNATURE_ALGORITHM,
    SealedPayload, SignatureEngine,
};

/// Which protections a packet receives on its way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seal {
    pub sign: bool,
    pub encrypt: bool,
}

impl Seal {
    /// Signed, then encrypted. Invoices and the token handshake.
    pub const FULL: Seal = Seal {
        sign: true,
        encrypt: true,
    };
    pub const SIGN_ONLY: Seal = Seal {
        sign: true,
        encrypt: false,
    };
    /// Read-only inquiries travel as plain JSON.
    pub const PLAIN: Seal = Seal {
        sign: false,
        encrypt: false,
    };
}

/// A packet as it travels on the wire.
///
/// `data` holds either the base64 ciphertext (encrypted) or the canonical
/// JSON object itself (plain). The signature always covers the canonical
/// bytes, never the ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub uid: Uuid,
    pub packet_type: PacketType,
    pub retry: bool,
    pub fiscal_id: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetric_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_algorithm: Option<String>,
}

impl Envelope {
    /// Sign and/or encrypt `packet` for the taxpayer `fiscal_id`.
    pub fn seal(
        packet: &Packet,
        fiscal_id: &str,
        keys: &KeyMaterial,
        signer: &SignatureEngine,
        encryptor: &EncryptionEngine,
        seal: Seal,
    ) -> Result<Self, MoadianError> {
        let canonical = packet.canonical_bytes()?;

        let data_signature = if seal.sign {
            Some(BASE64.encode(signer.sign(&canonical, keys.private_key())?))
        } else {
            None
        };

        let mut envelope = Envelope {
            uid: packet.uid(),
            packet_type: packet.packet_type(),
            retry: packet.is_retry(),
            fiscal_id: fiscal_id.to_string(),
            data: Value::Null,
            signature_algorithm: data_signature
                .as_ref()
                .map(|_| SIGNATURE_ALGORITHM.to_string()),
            data_signature,
            symmetric_key: None,
            iv: None,
            encryption_key_id: None,
            encryption_algorithm: None,
        };

        if seal.encrypt {
            let sealed = encryptor.encrypt(&canonical, keys.public_key(), keys.org_key_id())?;
            envelope.data = Value::String(BASE64.encode(&sealed.ciphertext));
            envelope.symmetric_key = Some(BASE64.encode(&sealed.encrypted_content_key));
            envelope.iv = Some(BASE64.encode(sealed.iv));
            envelope.encryption_key_id = Some(sealed.org_key_id);
            envelope.encryption_algorithm = Some(CONTENT_ALGORITHM.to_string());
        } else {
            envelope.data = serde_json::from_slice(&canonical).map_err(|e| {
                MoadianError::InvalidArgument(format!("canonical form is not JSON: {e}"))
            })?;
        }

        Ok(envelope)
    }

    pub fn is_encrypted(&self) -> bool {
        self.symmetric_key.is_some()
    }

    /// Decoded signature bytes, if the envelope was signed.
    pub fn signature(&self) -> Result<Option<Vec<u8>>, MoadianError> {
        self.data_signature
            .as_deref()
            .map(|sig| decode("dataSignature", sig))
            .transpose()
    }

    /// Reassemble the encrypted parts so the holder of the authority key can
    /// open them with [`EncryptionEngine::decrypt`].
    pub fn sealed_payload(&self) -> Result<SealedPayload, MoadianError> {
        let missing = |field: &str| {
            MoadianError::Encryption(format!("envelope has no {field}; not encrypted"))
        };

        let ciphertext = match &self.data {
            Value::String(data) => decode("data", data)?,
            _ => return Err(missing("ciphertext")),
        };
        let symmetric_key = self
            .symmetric_key
            .as_deref()
            .ok_or_else(|| missing("symmetricKey"))?;
        let encrypted_content_key = decode("symmetricKey", symmetric_key)?;
        let iv_bytes = decode("iv", self.iv.as_deref().ok_or_else(|| missing("iv"))?)?;
        let iv: [u8; IV_SIZE] = iv_bytes.as_slice().try_into().map_err(|_| {
            MoadianError::Encryption(format!(
                "iv has {} bytes, expected {IV_SIZE}",
                iv_bytes.len()
            ))
        })?;

        Ok(SealedPayload {
            ciphertext,
            iv,
            encrypted_content_key,
            org_key_id: self.encryption_key_id.clone().unwrap_or_default(),
        })
    }
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, MoadianError> {
    BASE64
        .decode(value)
        .map_err(|e| MoadianError::Encryption(format!("{field} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::core::InvoiceId;
    use crate::crypto::fixtures::*;
    use crate::crypto::{PrivateKey, parse_public_key};

    fn keys() -> KeyMaterial {
        KeyMaterial::new(AUTHORITY_PUBLIC, CLIENT_PRIVATE, None, "ORG-KEY-1").unwrap()
    }

    fn packet() -> Packet {
        Packet::new(
            InvoiceId::parse("001234567804D5500000000073").unwrap(),
            &json!({"header": {"inno": "0000000007"}}),
            Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn full_seal_round_trips() {
        let packet = packet();
        let envelope = Envelope::seal(
            &packet,
            "0012345678",
            &keys(),
            &SignatureEngine,
            &EncryptionEngine,
            Seal::FULL,
        )
        .unwrap();

        assert!(envelope.is_encrypted());
        assert_eq!(envelope.uid, packet.uid());
        assert_eq!(envelope.encryption_key_id.as_deref(), Some("ORG-KEY-1"));
        assert_eq!(envelope.signature_algorithm.as_deref(), Some("SHA256withRSA"));

        let authority = PrivateKey::from_pem(AUTHORITY_PRIVATE, None).unwrap();
        let plaintext = EncryptionEngine
            .decrypt(&envelope.sealed_payload().unwrap(), &authority)
            .unwrap();
        assert_eq!(plaintext, packet.canonical_bytes().unwrap());

        let client_public = parse_public_key(CLIENT_PUBLIC).unwrap();
        let signature = envelope.signature().unwrap().unwrap();
        assert!(SignatureEngine.verify(&plaintext, &signature, &client_public));
    }

    #[test]
    fn plain_seal_carries_canonical_object() {
        let envelope = Envelope::seal(
            &packet(),
            "0012345678",
            &keys(),
            &SignatureEngine,
            &EncryptionEngine,
            Seal::PLAIN,
        )
        .unwrap();

        assert!(!envelope.is_encrypted());
        assert!(envelope.signature().unwrap().is_none());
        assert_eq!(envelope.data["invoiceId"], "001234567804D5500000000073");
        assert_eq!(envelope.data["createdAt"], 1710489600000i64);

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["packetType"], "INVOICE.V01");
        assert_eq!(wire["fiscalId"], "0012345678");
        assert!(wire.get("symmetricKey").is_none());
        assert!(wire.get("dataSignature").is_none());
        assert!(matches!(
            envelope.sealed_payload(),
            Err(MoadianError::Encryption(_))
        ));
    }

    #[test]
    fn sign_only_leaves_data_readable() {
        let envelope = Envelope::seal(
            &packet(),
            "0012345678",
            &keys(),
            &SignatureEngine,
            &EncryptionEngine,
            Seal::SIGN_ONLY,
        )
        .unwrap();
        assert!(envelope.data.is_object());
        assert!(envelope.signature().unwrap().is_some());
    }
}
