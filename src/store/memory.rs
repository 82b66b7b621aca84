//! InMemoryItemStore: an ItemStore over in-process ordered maps.
//!
//! Tables are created on first write. Keys are kept in a BTreeMap ordered by
//! (name, version), so a partition query is a range scan.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{apply_query, Item, ItemKey, ItemStore, Query, StoreError};

type Table = BTreeMap<ItemKey, Item>;

#[derive(Default)]
pub struct InMemoryItemStore {
    /// table name → (key → item)
    tables: Mutex<HashMap<String, Table>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Overwrite an item unconditionally. Bypasses the insert-if-absent
    /// guard; meant for seeding fixtures and simulating foreign writers.
    pub fn put_item_unchecked(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let key = ItemKey::from_item(&item)
            .ok_or_else(|| StoreError::service("ValidationException: item is missing its key"))?;
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(key, item);
        Ok(())
    }
}

/// All items under `name`, ascending by version.
fn partition(table: &Table, name: &str) -> Vec<Item> {
    table
        .range(ItemKey::new(name, "")..)
        .take_while(|(k, _)| k.name == name)
        .map(|(_, item)| item.clone())
        .collect()
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn put_item_if_absent(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let key = ItemKey::from_item(&item)
            .ok_or_else(|| StoreError::service("ValidationException: item is missing its key"))?;
        let mut tables = self.tables.lock();
        let table = tables.entry(table.to_string()).or_default();
        if table.contains_key(&key) {
            return Err(StoreError::ConditionalCheckFailed);
        }
        table.insert(key, item);
        Ok(())
    }

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        Ok(self
            .tables
            .lock()
            .get(table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Item>, StoreError> {
        let tables = self.tables.lock();
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(apply_query(partition(t, &query.name).into_iter(), query))
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> Result<(), StoreError> {
        if let Some(t) = self.tables.lock().get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }
}
