use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::keys::PrivateKey;
use crate::core::MoadianError;

/// Algorithm identifier for the payload cipher.
pub const CONTENT_ALGORITHM: &str = "AES-256-GCM";

/// Algorithm identifier for the content-key wrap.
pub const KEY_WRAP_ALGORITHM: &str = "RSA-OAEP-256";

pub const CONTENT_KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 12;

/// Single-use AES key, wiped when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
struct ContentKey([u8; CONTENT_KEY_SIZE]);

impl ContentKey {
    fn generate() -> Self {
        let mut bytes = [0u8; CONTENT_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Output of [`EncryptionEngine::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// AES-GCM ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    /// Content key wrapped under the authority's public key.
    pub encrypted_content_key: Vec<u8>,
    /// Tells the authority which of its keys unwraps the content key.
    pub org_key_id: String,
}

/// Hybrid encryption: a fresh AES-256-GCM key per call, wrapped with
/// RSA-OAEP under the authority's public key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptionEngine;

impl EncryptionEngine {
    pub fn encrypt(
        &self,
        canonical: &[u8],
        public_key: &RsaPublicKey,
        org_key_id: &str,
    ) -> Result<SealedPayload, MoadianError> {
        let mut rng = rand::thread_rng();
        let content_key = ContentKey::generate();
        let mut iv = [0u8; IV_SIZE];
        rng.fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key.0));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), canonical)
            .map_err(|e| MoadianError::Encryption(format!("payload encryption failed: {e}")))?;

        let encrypted_content_key = public_key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), &content_key.0)
            .map_err(|e| MoadianError::Encryption(format!("content key wrap failed: {e}")))?;

        Ok(SealedPayload {
            ciphertext,
            iv,
            encrypted_content_key,
            org_key_id: org_key_id.to_string(),
        })
    }

    /// Inverse of [`encrypt`](Self::encrypt), given the private half of the
    /// wrapping key. Lets a client self-test its key pair end to end.
    pub fn decrypt(
        &self,
        sealed: &SealedPayload,
        private_key: &PrivateKey,
    ) -> Result<Vec<u8>, MoadianError> {
        let content_key = Zeroizing::new(
            private_key
                .with_secret(|secret| {
                    secret.decrypt(Oaep::new::<Sha256>(), &sealed.encrypted_content_key)
                })
                .map_err(|e| MoadianError::Encryption(format!("content key unwrap failed: {e}")))?,
        );
        if content_key.len() != CONTENT_KEY_SIZE {
            return Err(MoadianError::Encryption(format!(
                "content key has {} bytes, expected {CONTENT_KEY_SIZE}",
                content_key.len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key));
        cipher
            .decrypt(Nonce::from_slice(&sealed.iv), sealed.ciphertext.as_slice())
            .map_err(|e| MoadianError::Encryption(format!("payload decryption failed: {e}")))
    }
}
