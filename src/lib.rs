//! credvault: a versioned, envelope-encrypted secret store.
//!
//! Each write mints a fresh data key from a key management service, encrypts
//! the secret locally with AES-256-CTR, tags the ciphertext with HMAC-SHA256,
//! and inserts an immutable record at (name, version) into a key-value table.
//! Only the wrapped data key is persisted.

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod kms;
pub mod store;
pub mod types;
pub mod version;

pub use config::{EngineConfig, DEFAULT_KEY_ALIAS, DEFAULT_TABLE};
pub use engine::SecretEngine;
pub use envelope::{EnvelopeKeyManager, MintedKey};
pub use error::{BoxError, Result, SecretError};
pub use kms::{GeneratedDataKey, InMemoryKms, KeyManagement, KmsError};
#[cfg(feature = "sqlite")]
pub use store::SqliteItemStore;
pub use store::{
    AttributeValue, InMemoryItemStore, Item, ItemKey, ItemStore, Query, RecordStore, StoreError,
};
pub use types::{CredentialRecord, DecryptedCredential, EncryptionContext};
pub use version::{Version, VERSION_WIDTH};
