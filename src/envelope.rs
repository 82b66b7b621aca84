//! Envelope key manager.
//!
//! Mint: KMS generate → (DataKey, wrapped key)
//! Unwrap: KMS decrypt(wrapped key, context) → DataKey
//!
//! Service failures are translated here so callers can tell a denied key
//! from a context mismatch from a transport failure.

use std::sync::Arc;

use tracing::{debug, warn};

use credvault_crypto::DataKey;

use crate::error::{Result, SecretError};
use crate::kms::{KeyManagement, KmsError};
use crate::types::EncryptionContext;

/// A freshly minted data key and the wrapped form to persist.
#[derive(Debug)]
pub struct MintedKey {
    pub key: DataKey,
    pub wrapped: Vec<u8>,
}

#[derive(Clone)]
pub struct EnvelopeKeyManager {
    kms: Arc<dyn KeyManagement>,
}

impl EnvelopeKeyManager {
    pub fn new(kms: Arc<dyn KeyManagement>) -> Self {
        Self { kms }
    }

    /// Ask the service for a fresh `size`-byte data key under `key_alias`.
    pub async fn mint(
        &self,
        key_alias: &str,
        context: &EncryptionContext,
        size: usize,
    ) -> Result<MintedKey> {
        debug!(key_alias, context_keys = ?context.keys(), size, "generating data key");

        let mut generated = self
            .kms
            .generate_data_key(key_alias, context, size)
            .await
            .map_err(|e| translate(e, "generate a data key"))?;

        if generated.plaintext.len() != size {
            return Err(SecretError::Collaborator(
                format!(
                    "key service returned {} bytes of key material, requested {}",
                    generated.plaintext.len(),
                    size
                )
                .into(),
            ));
        }

        // Moves the material out; the emptied Zeroizing buffer drops clean.
        let key = DataKey::from_plaintext(std::mem::take(&mut *generated.plaintext))?;
        Ok(MintedKey {
            key,
            wrapped: generated.ciphertext_blob,
        })
    }

    /// Ask the service to decrypt a wrapped data key under `context`.
    pub async fn unwrap(&self, wrapped: &[u8], context: &EncryptionContext) -> Result<DataKey> {
        let mut plaintext = self
            .kms
            .decrypt(wrapped, context)
            .await
            .map_err(|e| translate(e, "decrypt"))?;

        Ok(DataKey::from_plaintext(std::mem::take(&mut *plaintext))?)
    }
}

fn translate(err: KmsError, action: &str) -> SecretError {
    match err {
        KmsError::AccessDenied(msg) => {
            warn!(action, "key service denied access");
            SecretError::AccessDenied(format!("KMS Access Denied to {}: {}", action, msg))
        }
        KmsError::InvalidCiphertext(msg) => SecretError::ContextMismatch(msg),
        KmsError::Service(source) => SecretError::Collaborator(source),
    }
}
