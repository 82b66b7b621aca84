//! Key-value store collaborator and the credential record adapter on top of it.
//!
//! The store is item-oriented: each item is a map of named attributes, keyed
//! by a partition attribute (`name`) and a sort attribute (`version`).

mod adapter;
mod memory;
mod record;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use adapter::RecordStore;
pub use memory::InMemoryItemStore;
pub use record::{decode_record, encode_record};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteItemStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BoxError;

/// Partition key attribute.
pub const PARTITION_KEY: &str = "name";

/// Sort key attribute.
pub const SORT_KEY: &str = "version";

// ============================================================================
// Item model
// ============================================================================

/// A typed attribute value, in the shape text-oriented stores expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, carried in its decimal string form.
    N(String),
    /// Binary.
    B(Vec<u8>),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_b(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::B(b) => Some(b),
            _ => None,
        }
    }
}

pub type Item = BTreeMap<String, AttributeValue>;

/// Composite primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub name: String,
    pub version: String,
}

impl ItemKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Read the key attributes out of an item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let name = item.get(PARTITION_KEY)?.as_s()?;
        let version = item.get(SORT_KEY)?.as_s()?;
        Some(Self::new(name, version))
    }
}

/// Query all items in one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    /// Sort by `version` descending instead of ascending.
    pub descending: bool,
    /// Maximum number of items returned.
    pub limit: Option<usize>,
    /// Read-after-write consistency.
    pub consistent_read: bool,
}

impl Query {
    /// Newest-first, strongly consistent query over one name.
    pub fn newest_first(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: true,
            limit: None,
            consistent_read: true,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// ItemStore
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found an item already present at the key.
    #[error("ConditionalCheckFailedException: item already exists")]
    ConditionalCheckFailed,

    #[error("{0}")]
    Service(#[source] BoxError),
}

impl StoreError {
    pub fn service(message: impl Into<String>) -> Self {
        let message: String = message.into();
        StoreError::Service(message.into())
    }
}

/// User-provided key-value store client.
///
/// Table names are passed per call; a store may hold many tables.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert `item` only if no item exists at its (name, version) key
    /// (the `attribute_not_exists(name)` condition). Fails with
    /// `ConditionalCheckFailed` otherwise; the existing item is untouched.
    async fn put_item_if_absent(&self, table: &str, item: Item) -> Result<(), StoreError>;

    /// Point lookup by composite key.
    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StoreError>;

    /// Items for one name, ordered by `version` string.
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Item>, StoreError>;

    /// Delete by composite key. Deleting a missing item is not an error.
    async fn delete_item(&self, table: &str, key: &ItemKey) -> Result<(), StoreError>;
}

/// Order and truncate one partition's items the way a `Query` asks.
pub(crate) fn apply_query<I>(items: I, query: &Query) -> Vec<Item>
where
    I: DoubleEndedIterator<Item = Item>,
{
    let limit = query.limit.unwrap_or(usize::MAX);
    if query.descending {
        items.rev().take(limit).collect()
    } else {
        items.take(limit).collect()
    }
}
