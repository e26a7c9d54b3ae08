use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use super::keys::PrivateKey;
use crate::core::MoadianError;

/// Algorithm identifier attached to signed envelopes.
pub const SIGNATURE_ALGORITHM: &str = "SHA256withRSA";

/// Detached RSASSA-PKCS1-v1_5 / SHA-256 signatures over canonical bytes.
///
/// Stateless; one instance can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine;

impl SignatureEngine {
    pub fn sign(&self, canonical: &[u8], key: &PrivateKey) -> Result<Vec<u8>, MoadianError> {
        let digest = Sha256::digest(canonical);
        key.with_secret(|secret| {
            secret.sign_with_rng(
                &mut rand::thread_rng(),
                Pkcs1v15Sign::new::<Sha256>(),
                &digest,
            )
        })
        .map_err(|e| MoadianError::Signing(e.to_string()))
    }

    /// Whether `signature` is valid for `canonical` under `public_key`.
    pub fn verify(&self, canonical: &[u8], signature: &[u8], public_key: &RsaPublicKey) -> bool {
        let digest = Sha256::digest(canonical);
        public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .is_ok()
    }
}
