//! DuckDB-backed key-value storage.
//!
//! All records live in a single `kv` table keyed by the full storage path
//! (e.g. `config/access`, `role/readonly`).

use crate::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use duckdb::{params, Connection, OptionalExt};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone)]
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        // DuckDB defaults to ~80% of RAM per connection; this store is tiny.
        conn.execute_batch("PRAGMA memory_limit='64MB'; PRAGMA threads=1;")?;
        debug!("opened kv store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key VARCHAR PRIMARY KEY,
                value BLOB NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE starts_with(key, ?) ORDER BY key")?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys
            .into_iter()
            .map(|k| k[prefix.len()..].to_string())
            .collect())
    }
}
