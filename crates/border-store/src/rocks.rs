//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options,
};
use serde_json::Value;
use tokio::sync::broadcast;

use border_core::{Collection, RecordKey, RecordPath, SchemaVersion};

use crate::change::{self, Change, ChangeFeed, Mutation};
use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, column_family};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
    feed: ChangeFeed,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            feed: ChangeFeed::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, collection: Collection) -> Result<Arc<BoundColumnFamily<'_>>> {
        let name = column_family(collection);
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize(value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize(data: &[u8]) -> Result<Value> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for RocksStore {
    fn get(&self, path: &RecordPath) -> Result<Option<Value>> {
        let cf = self.cf(path.collection)?;
        let key = keys::record_key(path);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list(
        &self,
        version: &SchemaVersion,
        collection: Collection,
    ) -> Result<Vec<(RecordKey, Value)>> {
        let cf = self.cf(collection)?;
        let prefix = keys::version_prefix(version);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            match keys::extract_record_key(&prefix, &key) {
                Some(record_key) => records.push((record_key, Self::deserialize(&value)?)),
                None => tracing::warn!(
                    collection = %collection,
                    key = %String::from_utf8_lossy(&key),
                    "Skipping record with invalid key"
                ),
            }
        }

        Ok(records)
    }

    fn transaction(
        &self,
        path: &RecordPath,
        update: &mut dyn FnMut(Option<&Value>) -> Mutation,
    ) -> Result<bool> {
        let change = {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|_| StoreError::Database("write lock poisoned".into()))?;

            let before = self.get(path)?;
            let mutation = update(before.as_ref());
            if mutation == Mutation::Abort {
                return Ok(false);
            }

            let after = change::normalize(path, mutation)?;
            let cf = self.cf(path.collection)?;
            let key = keys::record_key(path);

            let written = match &after {
                Some(value) => self.db.put_cf(&cf, key, Self::serialize(value)?),
                None => self.db.delete_cf(&cf, key),
            };
            written.map_err(|e| StoreError::Database(e.to_string()))?;

            Change {
                path: path.clone(),
                before,
                after,
            }
        };

        self.feed.publish(change);
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}
