//! Seal/open pipeline for a single secret under a data key.
//!
//! Seal: plaintext → AES-CTR(cipher key) → HMAC(mac key, ciphertext)
//! Open: verify HMAC → AES-CTR(cipher key) → plaintext
//!
//! Open verifies before decrypting, so unauthenticated plaintext is never
//! produced.

use crate::aes_ctr;
use crate::dek::DataKey;
use crate::error::CryptoError;
use crate::tag::{compute_tag, verify_tag};
use crate::types::HMAC_TAG_LENGTH;

/// Ciphertext and its integrity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; HMAC_TAG_LENGTH],
}

/// Encrypt and tag `plaintext` under `key`.
pub fn seal(key: &DataKey, plaintext: &[u8]) -> Result<SealedSecret, CryptoError> {
    let ciphertext = aes_ctr::encrypt(key.cipher_key(), plaintext)?;
    let tag = compute_tag(key.mac_key(), &ciphertext);
    Ok(SealedSecret { ciphertext, tag })
}

/// Verify `tag` over `ciphertext`, then decrypt.
///
/// # Errors
/// `CryptoError::TagMismatch` if the tag does not verify; no decryption is attempted.
pub fn open(key: &DataKey, ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if !verify_tag(key.mac_key(), ciphertext, tag) {
        return Err(CryptoError::TagMismatch);
    }
    aes_ctr::decrypt(key.cipher_key(), ciphertext)
}
