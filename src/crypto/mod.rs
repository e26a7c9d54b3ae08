//! Key material and the two cryptographic engines.
//!
//! Signing always runs over the canonical plaintext; encryption wraps the
//! same bytes afterwards, so a signature authenticates content independent of
//! the cipher.
//!
//! | Step | Scheme |
//! |------|--------|
//! | Signature | RSASSA-PKCS1-v1_5, SHA-256 |
//! | Payload | AES-256-GCM, 96-bit IV |
//! | Content key | RSA-OAEP, SHA-256 |

mod encryption;
mod keys;
mod signature;

pub use encryption::{
    CONTENT_ALGORITHM, CONTENT_KEY_SIZE, EncryptionEngine, IV_SIZE, KEY_WRAP_ALGORITHM,
    SealedPayload,
};
pub use keys::{KeyMaterial, PrivateKey, parse_public_key};
pub use signature::{SIGNATURE_ALGORITHM, SignatureEngine};

#[cfg(test)]
pub(crate) use keys::fixtures;

pub use rsa::RsaPublicKey;
