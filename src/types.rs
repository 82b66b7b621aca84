//! Record model: encryption context, persisted credential records, and the
//! decrypted view handed back to readers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::Result;
use crate::version::Version;

// ============================================================================
// EncryptionContext
// ============================================================================

/// Caller-supplied attributes bound into key wrap/unwrap as additional
/// authenticated data. The same context must be presented on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptionContext(BTreeMap<String, String>);

impl EncryptionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys only, for logging. Values may carry tenant data and are not logged.
    pub fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EncryptionContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// CredentialRecord
// ============================================================================

/// One immutable stored version of a named secret.
///
/// `version` is kept exactly as stored. Records written by this crate always
/// carry a [`Version`] encoding, but older writers may have used other strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub name: String,
    pub version: String,
    /// KMS ciphertext of the data key.
    pub wrapped_key: Vec<u8>,
    /// AES-CTR output of the secret.
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over `ciphertext`.
    pub mac: Vec<u8>,
    /// Unix seconds. Informational only.
    pub created_at: i64,
}

impl CredentialRecord {
    /// Parse the stored version with the fixed-width codec.
    pub fn version_number(&self) -> Result<Version> {
        Version::decode(&self.version)
    }
}

// ============================================================================
// DecryptedCredential
// ============================================================================

/// A credential record together with its recovered plaintext.
///
/// Never persisted. The plaintext is zeroized on drop and redacted from `Debug`.
pub struct DecryptedCredential {
    record: CredentialRecord,
    secret: Zeroizing<String>,
}

impl DecryptedCredential {
    pub(crate) fn new(record: CredentialRecord, secret: String) -> Self {
        Self {
            record,
            secret: Zeroizing::new(secret),
        }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn version(&self) -> &str {
        &self.record.version
    }

    pub fn created_at(&self) -> i64 {
        self.record.created_at
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }
}

impl fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedCredential")
            .field("name", &self.record.name)
            .field("version", &self.record.version)
            .field("created_at", &self.record.created_at)
            .field("secret", &"<redacted>")
            .finish()
    }
}
