//! Realtime record store for border.
//!
//! The store holds the version-prefixed record tree the handlers read and
//! write, and publishes every committed change so that write-triggers can be
//! dispatched from it.
//!
//! # Architecture
//!
//! Backends implement four primitives (`get`, `list`, `transaction`,
//! `subscribe`). Every other write (`set`, `update`, `set_child`, `push`,
//! `delete`) is built on `transaction`, so each one is atomic with respect to
//! the others and publishes exactly one [`Change`].
//!
//! - [`MemoryStore`]: process-local map, used by tests and ephemeral runs
//! - [`RocksStore`]: `RocksDB` with one column family per collection
//!
//! # Example
//!
//! ```
//! use border_core::{Collection, RecordKey, SchemaVersion};
//! use border_store::{MemoryStore, Store};
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! let path = SchemaVersion::default().record(Collection::User, &RecordKey::new("uid_1").unwrap());
//!
//! store.set_child(&path, "customerID", json!("c1")).unwrap();
//! assert_eq!(store.get(&path).unwrap(), Some(json!({"customerID": "c1"})));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod change;
pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use change::{Change, Mutation};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use border_core::{Collection, RecordKey, RecordPath, SchemaVersion};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Backend Primitives
    // =========================================================================

    /// Read a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get(&self, path: &RecordPath) -> Result<Option<Value>>;

    /// List all records of a collection, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list(&self, version: &SchemaVersion, collection: Collection)
        -> Result<Vec<(RecordKey, Value)>>;

    /// Atomically read-modify-write a record.
    ///
    /// `update` sees the current value and decides what to store. No other
    /// write to the store can interleave between the read and the write.
    /// Returns whether the transaction committed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidValue` if the new value is not a JSON object,
    /// or an error if the database operation fails.
    fn transaction(
        &self,
        path: &RecordPath,
        update: &mut dyn FnMut(Option<&Value>) -> Mutation,
    ) -> Result<bool>;

    /// Subscribe to committed changes.
    fn subscribe(&self) -> broadcast::Receiver<Change>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace a record. Writing `null` deletes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or the write fails.
    fn set(&self, path: &RecordPath, value: Value) -> Result<()> {
        let mut value = Some(value);
        self.transaction(path, &mut |_| value.take().map_or(Mutation::Abort, Mutation::Put))?;
        Ok(())
    }

    /// Merge fields into a record, creating it if needed. A `null` field is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn update(&self, path: &RecordPath, fields: Map<String, Value>) -> Result<()> {
        let mut fields = Some(fields);
        self.transaction(path, &mut |current| match fields.take() {
            Some(fields) => Mutation::Put(change::merge(current, fields)),
            None => Mutation::Abort,
        })?;
        Ok(())
    }

    /// Set a single field of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_child(&self, path: &RecordPath, field: &str, value: Value) -> Result<()> {
        let mut fields = Map::new();
        fields.insert(field.to_string(), value);
        self.update(path, fields)
    }

    /// Store a record under a newly generated, time-ordered key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn push(
        &self,
        version: &SchemaVersion,
        collection: Collection,
        value: Value,
    ) -> Result<RecordKey> {
        let key = RecordKey::generate();
        self.set(&version.record(collection, &key), value)?;
        Ok(key)
    }

    /// Delete a record. Deleting a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete(&self, path: &RecordPath) -> Result<()> {
        self.transaction(path, &mut |_| Mutation::Delete)?;
        Ok(())
    }
}

/// Typed helpers over any [`Store`].
pub trait StoreExt: Store {
    /// Read and deserialize a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the record has the wrong shape.
    fn get_as<T: DeserializeOwned>(&self, path: &RecordPath) -> Result<Option<T>> {
        self.get(path)?
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .transpose()
    }

    /// Serialize and store a record under a generated key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn push_as<T: Serialize>(
        &self,
        version: &SchemaVersion,
        collection: Collection,
        record: &T,
    ) -> Result<RecordKey> {
        self.push(version, collection, serde_json::to_value(record)?)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
