//! Key management collaborator: mints and unwraps data keys.
//!
//! The engine never sends secret plaintext to the service, only asks it to
//! generate a data key under a wrapping key alias and to decrypt that key again.

mod memory;

pub use memory::InMemoryKms;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::error::BoxError;
use crate::types::EncryptionContext;

/// A freshly generated data key in both forms.
pub struct GeneratedDataKey {
    /// Use once, then drop.
    pub plaintext: Zeroizing<Vec<u8>>,
    /// Persist this as the record's wrapped key.
    pub ciphertext_blob: Vec<u8>,
}

/// Failures a key management service must keep distinguishable.
#[derive(Debug, Error)]
pub enum KmsError {
    /// Caller's credentials may not use the wrapping key.
    #[error("AccessDeniedException: {0}")]
    AccessDenied(String),

    /// Ciphertext was not produced under this context (or is corrupt).
    #[error("InvalidCiphertextException: {0}")]
    InvalidCiphertext(String),

    /// Anything else: transport, throttling, unknown key, validation.
    #[error("{0}")]
    Service(#[source] BoxError),
}

impl KmsError {
    pub fn service(message: impl Into<String>) -> Self {
        let message: String = message.into();
        KmsError::Service(message.into())
    }
}

/// User-provided key management client.
///
/// Implementations wrap a remote KMS. The encryption context is additional
/// authenticated data: `decrypt` must fail with `InvalidCiphertext` unless it
/// equals the context given to `generate_data_key`.
#[async_trait]
pub trait KeyManagement: Send + Sync {
    /// Generate `num_bytes` of random key material wrapped under `key_id`.
    async fn generate_data_key(
        &self,
        key_id: &str,
        context: &EncryptionContext,
        num_bytes: usize,
    ) -> Result<GeneratedDataKey, KmsError>;

    /// Unwrap a ciphertext blob produced by `generate_data_key`.
    async fn decrypt(
        &self,
        ciphertext_blob: &[u8],
        context: &EncryptionContext,
    ) -> Result<Zeroizing<Vec<u8>>, KmsError>;
}
