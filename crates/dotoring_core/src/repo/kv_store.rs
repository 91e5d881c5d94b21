//! SQLite implementation of the durable key-value collaborator.
//!
//! # Invariants
//! - One row per key; `set` overwrites.
//! - Prefix listing is exact (no `LIKE` wildcard interpretation).

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::spi::{CollabError, CollabResult, KeyValueStore};
use async_trait::async_trait;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable key-value store over the `kv_entries` table.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Wraps an already-migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn kv_error(operation: &'static str, err: rusqlite::Error) -> CollabError {
    let retryable = matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    );
    warn!(
        "event=kv_io module=repo status=error op={operation} retryable={retryable} error={err}"
    );
    CollabError::new("kv", "sqlite_error", format!("{operation}: {err}"), retryable)
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> CollabResult<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| kv_error("get", err))
    }

    async fn set(&self, key: &str, value: &str) -> CollabResult<()> {
        self.conn()
            .execute(
                "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![key, value],
            )
            .map(|_| ())
            .map_err(|err| kv_error("set", err))
    }

    async fn remove(&self, key: &str) -> CollabResult<()> {
        self.conn()
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])
            .map(|_| ())
            .map_err(|err| kv_error("remove", err))
    }

    async fn multi_get(&self, keys: &[String]) -> CollabResult<Vec<(String, Option<String>)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare_cached("SELECT value FROM kv_entries WHERE key = ?1;")
            .map_err(|err| kv_error("multi_get", err))?;

        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            let value = stmt
                .query_row([key], |row| row.get::<_, String>(0))
                .optional()
                .map_err(|err| kv_error("multi_get", err))?;
            pairs.push((key.clone(), value));
        }
        Ok(pairs)
    }

    async fn multi_remove(&self, keys: &[String]) -> CollabResult<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|err| kv_error("multi_remove", err))?;
        {
            let mut stmt = tx
                .prepare_cached("DELETE FROM kv_entries WHERE key = ?1;")
                .map_err(|err| kv_error("multi_remove", err))?;
            for key in keys {
                stmt.execute([key])
                    .map_err(|err| kv_error("multi_remove", err))?;
            }
        }
        tx.commit().map_err(|err| kv_error("multi_remove", err))
    }

    async fn list_keys_with_prefix(&self, prefix: &str) -> CollabResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT key FROM kv_entries
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key ASC;",
            )
            .map_err(|err| kv_error("list_keys", err))?;
        let keys = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))
            .map_err(|err| kv_error("list_keys", err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| kv_error("list_keys", err))?;
        Ok(keys)
    }
}
