//! Key-value storage for leasegate.
//!
//! The broker persists two kinds of records: the access configuration and
//! role definitions. Both are opaque byte values under string keys, so the
//! storage seam is a small get/put/delete/list contract.
//!
//! # Backends
//!
//! - [`InMemoryStorage`]: process-local map, used by tests and embedders
//!   that bring their own persistence.
//! - [`DuckDbStorage`]: single `kv` table in a DuckDB file.
//!
//! Implementations guarantee read-your-writes per key. There are no
//! cross-key transactions.

mod duckdb_store;
mod error;
mod memory;

pub use duckdb_store::DuckDbStorage;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage collaborator consulted for config and role records.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the value under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Inserts or overwrites the value under `key`.
    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists keys starting with `prefix`, with the prefix stripped, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// JSON helpers layered over any [`Storage`].
#[async_trait]
pub trait StorageExt: Storage {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes).await
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}
