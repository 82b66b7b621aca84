//! SqliteItemStore: a durable ItemStore backed by a single SQLite database.
//!
//! Each logical table becomes one SQL table keyed by (name, version). Items are
//! stored whole as JSON next to their key columns, so version ordering is
//! SQLite's byte-wise TEXT ordering.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{Item, ItemKey, ItemStore, Query, StoreError};

pub struct SqliteItemStore {
    conn: Mutex<Connection>,
    /// Tables already created in this process.
    created: Mutex<HashSet<String>>,
}

impl SqliteItemStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(sql_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(sql_error)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            created: Mutex::new(HashSet::new()),
        }
    }

    fn ensure_table(&self, conn: &Connection, table: &str) -> Result<(), StoreError> {
        if self.created.lock().contains(table) {
            return Ok(());
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                item TEXT NOT NULL,
                PRIMARY KEY (name, version)
            ) WITHOUT ROWID;",
            quote_ident(table)
        ))
        .map_err(sql_error)?;
        self.created.lock().insert(table.to_string());
        Ok(())
    }
}

// ============================================================================
// ItemStore
// ============================================================================

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn put_item_if_absent(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let key = ItemKey::from_item(&item)
            .ok_or_else(|| StoreError::service("ValidationException: item is missing its key"))?;
        let json = serde_json::to_string(&item).map_err(|e| StoreError::Service(Box::new(e)))?;

        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        let sql = format!(
            "INSERT INTO {} (name, version, item) VALUES (?1, ?2, ?3)",
            quote_ident(table)
        );
        match conn.execute(&sql, params![key.name, key.version, json]) {
            Ok(_) => Ok(()),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(StoreError::ConditionalCheckFailed)
            }
            Err(e) => Err(sql_error(e)),
        }
    }

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        let sql = format!(
            "SELECT item FROM {} WHERE name = ?1 AND version = ?2",
            quote_ident(table)
        );
        let json: Option<String> = conn
            .query_row(&sql, params![key.name, key.version], |row| row.get(0))
            .optional()
            .map_err(sql_error)?;
        json.map(|j| parse_item(&j)).transpose()
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Item>, StoreError> {
        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        let order = if query.descending { "DESC" } else { "ASC" };
        // SQLite treats a negative LIMIT as unbounded.
        let limit = query
            .limit
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let sql = format!(
            "SELECT item FROM {} WHERE name = ?1 ORDER BY version {} LIMIT ?2",
            quote_ident(table),
            order
        );

        let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
        let rows = stmt
            .query_map(params![query.name, limit], |row| row.get::<_, String>(0))
            .map_err(sql_error)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(parse_item(&row.map_err(sql_error)?)?);
        }
        Ok(items)
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        let sql = format!(
            "DELETE FROM {} WHERE name = ?1 AND version = ?2",
            quote_ident(table)
        );
        conn.execute(&sql, params![key.name, key.version])
            .map_err(sql_error)?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn parse_item(json: &str) -> Result<Item, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Service(Box::new(e)))
}

fn sql_error(err: rusqlite::Error) -> StoreError {
    StoreError::Service(Box::new(err))
}
