//! RecordStore: typed credential records over an ItemStore.

use std::sync::Arc;

use tracing::debug;

use super::record::{decode_record, encode_record};
use super::{ItemKey, ItemStore, Query, StoreError, SORT_KEY};
use crate::error::{Result, SecretError};
use crate::types::CredentialRecord;

#[derive(Clone)]
pub struct RecordStore {
    items: Arc<dyn ItemStore>,
}

impl RecordStore {
    pub fn new(items: Arc<dyn ItemStore>) -> Self {
        Self { items }
    }

    /// Write a new record. Never overwrites: an existing (name, version)
    /// fails with `AlreadyExists` and stays as it was.
    pub async fn insert(&self, table: &str, record: &CredentialRecord) -> Result<()> {
        debug!(table, name = %record.name, version = %record.version, "inserting credential");
        match self
            .items
            .put_item_if_absent(table, encode_record(record))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionalCheckFailed) => Err(SecretError::AlreadyExists {
                name: record.name.clone(),
                version: record.version.clone(),
            }),
            Err(e) => Err(collaborator(e)),
        }
    }

    /// Point lookup of one version.
    pub async fn get_exact(
        &self,
        table: &str,
        name: &str,
        version: &str,
    ) -> Result<CredentialRecord> {
        debug!(table, name, version, "getting credential");
        let item = self
            .items
            .get_item(table, &ItemKey::new(name, version))
            .await
            .map_err(collaborator)?
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
                version: Some(version.to_string()),
            })?;
        decode_record(&item)
    }

    /// The record with the greatest version string for `name`.
    pub async fn get_latest(&self, table: &str, name: &str) -> Result<CredentialRecord> {
        debug!(table, name, "getting highest version credential");
        let items = self
            .items
            .query(table, &Query::newest_first(name).with_limit(1))
            .await
            .map_err(collaborator)?;
        let item = items.first().ok_or_else(|| not_found(name))?;
        decode_record(item)
    }

    /// The greatest stored version string for `name`, without decoding the record.
    pub async fn latest_version(&self, table: &str, name: &str) -> Result<Option<String>> {
        debug!(table, name, "looking up highest version");
        let items = self
            .items
            .query(table, &Query::newest_first(name).with_limit(1))
            .await
            .map_err(collaborator)?;
        Ok(items
            .first()
            .and_then(|item| item.get(SORT_KEY))
            .and_then(|v| v.as_s())
            .map(str::to_string))
    }

    /// Delete every version of `name`, newest first, one item at a time.
    ///
    /// Not atomic: the first failure is returned immediately and deletions
    /// already made stay committed. Returns the number of items deleted.
    pub async fn delete_all(&self, table: &str, name: &str) -> Result<usize> {
        let items = self
            .items
            .query(table, &Query::newest_first(name))
            .await
            .map_err(collaborator)?;

        let mut deleted = 0;
        for item in &items {
            let key = ItemKey::from_item(item)
                .ok_or_else(|| SecretError::malformed("version", "item is missing its key"))?;
            debug!(table, name = %key.name, version = %key.version, "deleting credential");
            self.items
                .delete_item(table, &key)
                .await
                .map_err(collaborator)?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

fn not_found(name: &str) -> SecretError {
    SecretError::NotFound {
        name: name.to_string(),
        version: None,
    }
}

fn collaborator(err: StoreError) -> SecretError {
    match err {
        StoreError::Service(source) => SecretError::Collaborator(source),
        other => SecretError::Collaborator(Box::new(other)),
    }
}
