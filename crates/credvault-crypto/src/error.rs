use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid data key length: need more than {min} bytes, got {got}")]
    InvalidDataKeyLength { min: usize, got: usize },

    #[error("HMAC tag does not match ciphertext")]
    TagMismatch,
}
