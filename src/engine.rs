//! SecretEngine: Put / Get / GetLatest / ResolveNextVersion / Delete.
//!
//! Write: mint data key → AES-CTR → HMAC over ciphertext → conditional insert
//! Read:  fetch record → unwrap data key → verify HMAC → AES-CTR → plaintext
//!
//! The engine holds only its configuration and collaborator handles, so a
//! single instance may be shared across tasks.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use credvault_crypto::{open, seal, CryptoError};

use crate::config::EngineConfig;
use crate::envelope::EnvelopeKeyManager;
use crate::error::{Result, SecretError};
use crate::kms::KeyManagement;
use crate::store::{ItemStore, RecordStore};
use crate::types::{CredentialRecord, DecryptedCredential, EncryptionContext};
use crate::version::Version;

#[derive(Clone)]
pub struct SecretEngine {
    keys: EnvelopeKeyManager,
    records: RecordStore,
    config: EngineConfig,
}

impl SecretEngine {
    pub fn new(
        kms: Arc<dyn KeyManagement>,
        store: Arc<dyn ItemStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keys: EnvelopeKeyManager::new(kms),
            records: RecordStore::new(store),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// An engine on `table` sharing this engine's collaborators.
    /// An empty `table` keeps the configured one.
    pub fn for_table(&self, table: &str) -> Self {
        let mut engine = self.clone();
        if !table.is_empty() {
            engine.config.table = table.to_string();
        }
        engine
    }

    // ------------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------------

    /// Encrypt and store `plaintext` as a new version of `name`.
    ///
    /// `version` defaults to [`Version::FIRST`]; picking the next free version
    /// is left to [`SecretEngine::resolve_next_version`]. A taken version fails
    /// with `AlreadyExists` and the stored record is left untouched.
    pub async fn put(
        &self,
        name: &str,
        plaintext: &str,
        version: Option<Version>,
        context: &EncryptionContext,
    ) -> Result<Version> {
        check_name(name)?;
        let version = version.unwrap_or(Version::FIRST);
        let table = self.config.table.as_str();
        debug!(table, name, %version, "putting secret");

        let minted = self
            .keys
            .mint(&self.config.key_alias, context, self.config.data_key_size)
            .await?;
        let sealed = seal(&minted.key, plaintext.as_bytes())?;
        // Key material goes before the network round trip.
        drop(minted.key);

        let record = CredentialRecord {
            name: name.to_string(),
            version: version.encode(),
            wrapped_key: minted.wrapped,
            ciphertext: sealed.ciphertext,
            mac: sealed.tag.to_vec(),
            created_at: Utc::now().timestamp(),
        };
        self.records.insert(table, &record).await?;

        info!(table, name, %version, "stored secret");
        Ok(version)
    }

    // ------------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------------

    /// Read and decrypt one exact version.
    pub async fn get(
        &self,
        name: &str,
        version: Version,
        context: &EncryptionContext,
    ) -> Result<DecryptedCredential> {
        check_name(name)?;
        let record = self
            .records
            .get_exact(&self.config.table, name, &version.encode())
            .await?;
        self.decrypt(record, context).await
    }

    /// Read and decrypt the highest version.
    pub async fn get_latest(
        &self,
        name: &str,
        context: &EncryptionContext,
    ) -> Result<DecryptedCredential> {
        check_name(name)?;
        let record = self.records.get_latest(&self.config.table, name).await?;
        self.decrypt(record, context).await
    }

    /// `get_latest` when `version` is 0, `get` otherwise.
    pub async fn read(
        &self,
        name: &str,
        version: u64,
        context: &EncryptionContext,
    ) -> Result<DecryptedCredential> {
        if version == 0 {
            self.get_latest(name, context).await
        } else {
            self.get(name, Version::new(version)?, context).await
        }
    }

    async fn decrypt(
        &self,
        record: CredentialRecord,
        context: &EncryptionContext,
    ) -> Result<DecryptedCredential> {
        debug!(
            table = %self.config.table,
            name = %record.name,
            version = %record.version,
            "decrypting secret"
        );
        let key = self.keys.unwrap(&record.wrapped_key, context).await?;

        let plaintext = match open(&key, &record.ciphertext, &record.mac) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(CryptoError::TagMismatch) => {
                return Err(SecretError::IntegrityFailure {
                    name: record.name,
                    version: record.version,
                })
            }
            Err(e) => return Err(e.into()),
        };
        drop(key);

        let secret = std::str::from_utf8(&plaintext)
            .map_err(|e| SecretError::malformed("contents", e.to_string()))?
            .to_string();
        Ok(DecryptedCredential::new(record, secret))
    }

    // ------------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------------

    /// Highest stored version of `name`, or `None` if it has none.
    ///
    /// # Errors
    /// `InvalidVersion` if the stored version is not a fixed-width number.
    pub async fn highest_version(&self, name: &str) -> Result<Option<Version>> {
        check_name(name)?;
        self.records
            .latest_version(&self.config.table, name)
            .await?
            .map(|v| Version::decode(&v))
            .transpose()
    }

    /// The version a write should use.
    ///
    /// A non-zero `requested` version is returned as is; collisions surface
    /// later as `AlreadyExists` from [`SecretEngine::put`]. Zero means one past
    /// the highest stored version, or [`Version::FIRST`] for a new name.
    pub async fn resolve_next_version(&self, name: &str, requested: u64) -> Result<Version> {
        if requested != 0 {
            return Version::new(requested);
        }
        match self.highest_version(name).await? {
            Some(latest) => latest.next(),
            None => Ok(Version::FIRST),
        }
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    /// Delete every version of `name`. Not atomic; see [`RecordStore::delete_all`].
    /// Returns the number of versions deleted.
    pub async fn delete(&self, name: &str) -> Result<usize> {
        check_name(name)?;
        let table = self.config.table.as_str();
        let deleted = self.records.delete_all(table, name).await?;
        info!(table, name, deleted, "deleted secret");
        Ok(deleted)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SecretError::InvalidName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kms::InMemoryKms;
    use crate::store::InMemoryItemStore;

    fn engine() -> SecretEngine {
        let kms = Arc::new(InMemoryKms::with_key(crate::config::DEFAULT_KEY_ALIAS).unwrap());
        SecretEngine::new(kms, Arc::new(InMemoryItemStore::new()), EngineConfig::default()).unwrap()
    }

    fn prod() -> EncryptionContext {
        EncryptionContext::new().with("env", "prod")
    }

    #[tokio::test]
    async fn put_defaults_to_first_version() {
        let engine = engine();
        let v = engine.put("db-pass", "s3cr3t", None, &prod()).await.unwrap();
        assert_eq!(v, Version::FIRST);

        let got = engine.get("db-pass", Version::FIRST, &prod()).await.unwrap();
        assert_eq!(got.secret(), "s3cr3t");
        assert_eq!(got.version(), "0000000000000000001");
        assert!(got.created_at() > 0);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.put("", "x", None, &prod()).await,
            Err(SecretError::InvalidName)
        ));
        assert!(matches!(
            engine.get_latest("", &prod()).await,
            Err(SecretError::InvalidName)
        ));
        assert!(matches!(engine.delete("").await, Err(SecretError::InvalidName)));
    }

    #[tokio::test]
    async fn empty_plaintext_round_trips() {
        let engine = engine();
        engine.put("blank", "", None, &prod()).await.unwrap();
        assert_eq!(engine.get_latest("blank", &prod()).await.unwrap().secret(), "");
    }

    #[tokio::test]
    async fn read_zero_means_latest() {
        let engine = engine();
        engine.put("k", "one", None, &prod()).await.unwrap();
        engine
            .put("k", "two", Some(Version::new(2).unwrap()), &prod())
            .await
            .unwrap();

        assert_eq!(engine.read("k", 0, &prod()).await.unwrap().secret(), "two");
        assert_eq!(engine.read("k", 1, &prod()).await.unwrap().secret(), "one");
        assert!(matches!(
            engine.read("k", u64::MAX, &prod()).await,
            Err(SecretError::InvalidVersion(_))
        ));
    }

    #[tokio::test]
    async fn resolve_explicit_version_is_passed_through() {
        let engine = engine();
        engine.put("k", "one", None, &prod()).await.unwrap();
        assert_eq!(
            engine.resolve_next_version("k", 1).await.unwrap(),
            Version::FIRST
        );
        assert_eq!(
            engine.resolve_next_version("k", 7).await.unwrap().encode(),
            "0000000000000000007"
        );
    }

    #[tokio::test]
    async fn for_table_shares_collaborators() {
        let engine = engine();
        let other = engine.for_table("team-b");
        assert_eq!(other.config().table, "team-b");
        assert_eq!(engine.for_table("").config().table, engine.config().table);

        other.put("k", "b-side", None, &prod()).await.unwrap();
        assert!(matches!(
            engine.get_latest("k", &prod()).await,
            Err(SecretError::NotFound { .. })
        ));
        assert_eq!(other.get_latest("k", &prod()).await.unwrap().secret(), "b-side");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let kms = Arc::new(InMemoryKms::new());
        let result = SecretEngine::new(
            kms,
            Arc::new(InMemoryItemStore::new()),
            EngineConfig::default().with_data_key_size(32),
        );
        assert!(matches!(result, Err(SecretError::InvalidConfig(_))));
    }
}
