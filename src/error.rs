use thiserror::Error;

use credvault_crypto::CryptoError;

/// Boxed cause from a remote collaborator, kept intact for the caller.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret not found: {name}{}", version_suffix(.version))]
    NotFound {
        name: String,
        version: Option<String>,
    },

    #[error("Secret {name} version {version} already exists")]
    AlreadyExists { name: String, version: String },

    #[error("Secret HMAC validation failed for {name} version {version}")]
    IntegrityFailure { name: String, version: String },

    #[error("KMS access denied: {0}")]
    AccessDenied(String),

    #[error(
        "The encryption context provided may not match the one used when the credential was stored: {0}"
    )]
    ContextMismatch(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Secret name must not be empty")]
    InvalidName,

    #[error("Malformed credential record: {field}: {reason}")]
    MalformedRecord { field: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[source] BoxError),
}

fn version_suffix(version: &Option<String>) -> String {
    match version {
        Some(v) => format!(" (version {})", v),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, SecretError>;

impl SecretError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        SecretError::MalformedRecord {
            field,
            reason: reason.into(),
        }
    }
}
