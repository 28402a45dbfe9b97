//! In-memory storage implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

use border_core::{Collection, RecordKey, RecordPath, SchemaVersion};

use crate::change::{self, Change, ChangeFeed, Mutation};
use crate::error::{Result, StoreError};
use crate::Store;

/// Process-local store. Contents are lost when the process exits.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordPath, Value>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<RecordPath, Value>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, path: &RecordPath) -> Result<Option<Value>> {
        Ok(self.lock()?.get(path).cloned())
    }

    fn list(
        &self,
        version: &SchemaVersion,
        collection: Collection,
    ) -> Result<Vec<(RecordKey, Value)>> {
        let records = self.lock()?;
        let mut found: Vec<_> = records
            .iter()
            .filter(|(path, _)| &path.version == version && path.collection == collection)
            .map(|(path, value)| (path.key.clone(), value.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn transaction(
        &self,
        path: &RecordPath,
        update: &mut dyn FnMut(Option<&Value>) -> Mutation,
    ) -> Result<bool> {
        let change = {
            let mut records = self.lock()?;
            let before = records.get(path).cloned();

            let mutation = update(before.as_ref());
            if mutation == Mutation::Abort {
                return Ok(false);
            }

            let after = change::normalize(path, mutation)?;
            match &after {
                Some(value) => records.insert(path.clone(), value.clone()),
                None => records.remove(path),
            };

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreExt;
    use border_core::{CustomerRecord, UserId};
    use serde_json::json;

    fn path(collection: Collection, key: &str) -> RecordPath {
        SchemaVersion::default().record(collection, &RecordKey::new(key).unwrap())
    }

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        let charge = path(Collection::Charge, "ch_1");

        store.set(&charge, json!({"amount": 500})).unwrap();
        assert_eq!(store.get(&charge).unwrap(), Some(json!({"amount": 500})));

        store.delete(&charge).unwrap();
        assert_eq!(store.get(&charge).unwrap(), None);
    }

    #[test]
    fn update_merges_sibling_fields() {
        let store = MemoryStore::new();
        let source = path(Collection::Source, "s1");
        store
            .set(&source, json!({"token": "tok_1", "userID": "u1"}))
            .unwrap();

        store.set_child(&source, "error", json!("declined")).unwrap();

        assert_eq!(
            store.get(&source).unwrap(),
            Some(json!({"token": "tok_1", "userID": "u1", "error": "declined"}))
        );
    }

    #[test]
    fn push_generates_distinct_keys() {
        let store = MemoryStore::new();
        let version = SchemaVersion::default();
        let record = CustomerRecord::new(UserId::new("u1").unwrap(), "cus_1");

        let first = store.push_as(&version, Collection::Customer, &record).unwrap();
        let second = store.push_as(&version, Collection::Customer, &record).unwrap();
        assert_ne!(first, second);

        let listed = store.list(&version, Collection::Customer).unwrap();
        assert_eq!(listed.len(), 2);

        let read: CustomerRecord = store
            .get_as(&version.record(Collection::Customer, &first))
            .unwrap()
            .unwrap();
        assert_eq!(read.stripe_customer_id, "cus_1");
    }

    #[test]
    fn aborted_transaction_leaves_record() {
        let store = MemoryStore::new();
        let charge = path(Collection::Charge, "ch_1");
        store.set(&charge, json!({"amount": 1, "state": "pending"})).unwrap();

        let committed = store
            .transaction(&charge, &mut |current| {
                if current.and_then(|v| v.get("state")).is_some() {
                    Mutation::Abort
                } else {
                    Mutation::Put(json!({"amount": 1, "state": "pending"}))
                }
            })
            .unwrap();

        assert!(!committed);
    }

    #[test]
    fn versions_are_isolated() {
        let store = MemoryStore::new();
        let key = RecordKey::new("u1").unwrap();
        let v1 = SchemaVersion::default();
        let v2 = SchemaVersion::new("v2").unwrap();

        store
            .set(&v1.record(Collection::User, &key), json!({"customerID": "a"}))
            .unwrap();

        assert!(store.get(&v2.record(Collection::User, &key)).unwrap().is_none());
        assert!(store.list(&v2, Collection::User).unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_publish_changes() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        let source = path(Collection::Source, "s1");

        store.set_child(&source, "token", json!("tok_1")).unwrap();
        // Unchanged write is not published.
        store.set_child(&source, "token", json!("tok_1")).unwrap();
        store.delete(&source).unwrap();

        let first = changes.recv().await.unwrap();
        assert_eq!(first.before, None);
        assert_eq!(first.after, Some(json!({"token": "tok_1"})));

        let second = changes.recv().await.unwrap();
        assert_eq!(second.after, None);
        assert!(changes.try_recv().is_err());
    }
}
