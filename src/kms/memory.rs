//! In-process key management service.
//!
//! Holds named 256-bit wrapping keys and wraps data keys with AES-256-GCM,
//! using the encryption context as AAD so a context mismatch fails the same
//! way a remote service reports it.
//!
//! Wrapped blob format:
//! [alias length:2 BE][alias UTF-8][IV:12][AES-GCM(wrapping key, data key)+tag]

use std::collections::{HashMap, HashSet};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use super::{GeneratedDataKey, KeyManagement, KmsError};
use crate::types::EncryptionContext;

const WRAPPING_KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Largest data key the service will mint, as the real service caps it.
pub const MAX_DATA_KEY_BYTES: usize = 1024;

#[derive(Default)]
pub struct InMemoryKms {
    keys: RwLock<HashMap<String, Zeroizing<[u8; WRAPPING_KEY_LENGTH]>>>,
    denied: RwLock<HashSet<String>>,
}

impl InMemoryKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service with one random wrapping key under `alias`.
    pub fn with_key(alias: &str) -> Result<Self, KmsError> {
        let kms = Self::new();
        kms.create_key(alias)?;
        Ok(kms)
    }

    /// Add (or replace) a random wrapping key under `alias`.
    pub fn create_key(&self, alias: &str) -> Result<(), KmsError> {
        if alias.len() > u16::MAX as usize {
            return Err(KmsError::service(format!(
                "ValidationException: alias is {} bytes",
                alias.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; WRAPPING_KEY_LENGTH]);
        fill_random(&mut key[..])?;
        self.keys.write().insert(alias.to_string(), key);
        Ok(())
    }

    /// Revoke the caller's use of `alias`.
    pub fn deny(&self, alias: &str) {
        self.denied.write().insert(alias.to_string());
    }

    /// Restore the caller's use of `alias`.
    pub fn allow(&self, alias: &str) {
        self.denied.write().remove(alias);
    }

    fn check_access(&self, alias: &str) -> Result<(), KmsError> {
        if self.denied.read().contains(alias) {
            return Err(KmsError::AccessDenied(format!(
                "not authorized to use key {}",
                alias
            )));
        }
        Ok(())
    }

    fn cipher_for(&self, alias: &str) -> Option<Aes256Gcm> {
        let keys = self.keys.read();
        let key = keys.get(alias)?;
        Aes256Gcm::new_from_slice(&key[..]).ok()
    }
}

/// Canonical AAD for a context:
/// for each entry in key order, [key length:4 BE][key][value length:4 BE][value].
fn context_aad(context: &EncryptionContext) -> Vec<u8> {
    let mut aad = Vec::new();
    for (k, v) in context.iter() {
        aad.extend_from_slice(&(k.len() as u32).to_be_bytes());
        aad.extend_from_slice(k.as_bytes());
        aad.extend_from_slice(&(v.len() as u32).to_be_bytes());
        aad.extend_from_slice(v.as_bytes());
    }
    aad
}

fn fill_random(buf: &mut [u8]) -> Result<(), KmsError> {
    getrandom::getrandom(buf).map_err(|e| KmsError::service(format!("rng failure: {}", e)))
}

/// Split a wrapped blob into (alias, iv, sealed key).
fn parse_blob(blob: &[u8]) -> Option<(&str, &[u8], &[u8])> {
    let alias_len = u16::from_be_bytes(blob.get(..2)?.try_into().ok()?) as usize;
    let alias_end = 2 + alias_len;
    let alias = std::str::from_utf8(blob.get(2..alias_end)?).ok()?;
    let iv = blob.get(alias_end..alias_end + IV_LENGTH)?;
    let sealed = blob.get(alias_end + IV_LENGTH..)?;
    if sealed.len() < TAG_LENGTH {
        return None;
    }
    Some((alias, iv, sealed))
}

#[async_trait]
impl KeyManagement for InMemoryKms {
    async fn generate_data_key(
        &self,
        key_id: &str,
        context: &EncryptionContext,
        num_bytes: usize,
    ) -> Result<GeneratedDataKey, KmsError> {
        if num_bytes == 0 || num_bytes > MAX_DATA_KEY_BYTES {
            return Err(KmsError::service(format!(
                "ValidationException: NumberOfBytes must be in 1..={}, got {}",
                MAX_DATA_KEY_BYTES, num_bytes
            )));
        }
        self.check_access(key_id)?;
        let cipher = self.cipher_for(key_id).ok_or_else(|| {
            KmsError::service(format!("NotFoundException: key {} does not exist", key_id))
        })?;

        let mut plaintext = Zeroizing::new(vec![0u8; num_bytes]);
        fill_random(&mut plaintext)?;

        let mut iv = [0u8; IV_LENGTH];
        fill_random(&mut iv)?;

        let aad = context_aad(context);
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| KmsError::service(format!("wrap failed: {}", e)))?;

        let mut blob = Vec::with_capacity(2 + key_id.len() + IV_LENGTH + sealed.len());
        blob.extend_from_slice(&(key_id.len() as u16).to_be_bytes());
        blob.extend_from_slice(key_id.as_bytes());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&sealed);

        Ok(GeneratedDataKey {
            plaintext,
            ciphertext_blob: blob,
        })
    }

    async fn decrypt(
        &self,
        ciphertext_blob: &[u8],
        context: &EncryptionContext,
    ) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        let (alias, iv, sealed) = parse_blob(ciphertext_blob)
            .ok_or_else(|| KmsError::InvalidCiphertext("malformed ciphertext blob".into()))?;
        self.check_access(alias)?;
        let cipher = self
            .cipher_for(alias)
            .ok_or_else(|| KmsError::InvalidCiphertext(format!("unknown key {}", alias)))?;

        let aad = context_aad(context);
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(iv),
                Payload {
                    msg: sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| {
                KmsError::InvalidCiphertext("ciphertext or encryption context is invalid".into())
            })?;

        Ok(Zeroizing::new(plaintext))
    }
}
