//! Per-secret data key.
//!
//! A data key is minted by the key management service for one write and
//! unwrapped again for each read. Layout: `[cipher key:32][mac key:rest]`.
//! The material is zeroized when the key is dropped, on every exit path.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// Plaintext data key material, split positionally into cipher and MAC halves.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    material: Vec<u8>,
}

impl DataKey {
    /// Take ownership of plaintext key material returned by the key service.
    ///
    /// The material must be longer than [`AES_KEY_LENGTH`] so the MAC half is
    /// non-empty. On failure the rejected bytes are zeroized before returning.
    pub fn from_plaintext(mut material: Vec<u8>) -> Result<Self, CryptoError> {
        if material.len() <= AES_KEY_LENGTH {
            let got = material.len();
            material.zeroize();
            return Err(CryptoError::InvalidDataKeyLength {
                min: AES_KEY_LENGTH,
                got,
            });
        }
        Ok(Self { material })
    }

    /// First 32 bytes: the AES-256-CTR key.
    pub fn cipher_key(&self) -> &[u8] {
        &self.material[..AES_KEY_LENGTH]
    }

    /// Remaining bytes: the HMAC-SHA256 key.
    pub fn mac_key(&self) -> &[u8] {
        &self.material[AES_KEY_LENGTH..]
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("len", &self.material.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn splits_default_size() {
        let key = DataKey::from_plaintext(material(64)).unwrap();
        assert_eq!(key.len(), 64);
        assert_eq!(key.cipher_key(), &material(64)[..32]);
        assert_eq!(key.mac_key(), &material(64)[32..]);
    }

    #[test]
    fn mac_half_takes_the_rest() {
        let key = DataKey::from_plaintext(material(48)).unwrap();
        assert_eq!(key.cipher_key().len(), 32);
        assert_eq!(key.mac_key().len(), 16);
    }

    #[test]
    fn rejects_material_without_mac_half() {
        assert!(matches!(
            DataKey::from_plaintext(material(32)),
            Err(CryptoError::InvalidDataKeyLength { min: 32, got: 32 })
        ));
        assert!(DataKey::from_plaintext(Vec::new()).is_err());
    }

    #[test]
    fn zeroize_clears_material() {
        let mut key = DataKey::from_plaintext(vec![0xff; 64]).unwrap();
        key.zeroize();
        assert!(key.is_empty());
    }

    #[test]
    fn debug_does_not_print_material() {
        let key = DataKey::from_plaintext(vec![0xab; 64]).unwrap();
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("len: 64"));
    }
}
