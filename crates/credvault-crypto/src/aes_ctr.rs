//! AES-256-CTR codec for secret contents.
//!
//! Wire format: raw keystream XOR, same length as the plaintext, no IV and
//! no padding. The counter always starts at [`LEGACY_COUNTER_BLOCK`].
//!
//! SAFETY OF THE FIXED COUNTER: two plaintexts encrypted under the same key
//! leak their XOR. Callers must use a freshly minted data key for every
//! encryption and never expose an "encrypt with this key" path.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::error::CryptoError;
use crate::types::{AES_KEY_LENGTH, LEGACY_COUNTER_BLOCK};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// XOR `data` with the AES-256-CTR keystream for `key`.
///
/// Counter mode is self-inverse, so this is both encryption and decryption.
pub fn apply_keystream(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: key.len(),
        });
    }
    let mut cipher = Aes256Ctr::new_from_slices(key, &LEGACY_COUNTER_BLOCK).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: key.len(),
        }
    })?;

    let mut out = data.to_vec();
    cipher.apply_keystream(&mut out);
    Ok(out)
}

/// Encrypt plaintext with a 32-byte cipher key.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    apply_keystream(key, plaintext)
}

/// Decrypt ciphertext with a 32-byte cipher key.
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    apply_keystream(key, ciphertext)
}
