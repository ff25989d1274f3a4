//! SQLite-backed store (single `kv` table, WAL mode).

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::jobs::unix_now;

use super::{PersistenceStore, SCHEMA, UPSERT_SQL, WAL_PRAGMAS};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

impl SqliteStore {
    /// Open or create the store at `path` and ensure schema + WAL.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("open store {}", path.display()))?;
        apply_wal_and_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database with the same schema (no WAL pragmas needed).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

}

impl PersistenceStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("read key {}", key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()
            .execute(UPSERT_SQL, params![key, value, unix_now() as i64])
            .with_context(|| format!("write key {}", key))?;
        Ok(())
    }
}
