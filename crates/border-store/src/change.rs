//! Change notifications and write normalization shared by the backends.

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use border_core::RecordPath;

use crate::error::{Result, StoreError};

/// Buffered changes per subscriber before the slowest one starts lagging.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

/// A committed write to a single record.
///
/// `before` and `after` are the full record values; `None` means the record
/// did not exist. Writes that leave a record unchanged are not published.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Record that was written.
    pub path: RecordPath,
    /// Value before the write.
    pub before: Option<Value>,
    /// Value after the write.
    pub after: Option<Value>,
}

impl Change {
    /// Value of a field before the write.
    #[must_use]
    pub fn field_before(&self, field: &str) -> Option<&Value> {
        self.before.as_ref().and_then(|v| v.get(field))
    }

    /// Value of a field after the write.
    #[must_use]
    pub fn field_after(&self, field: &str) -> Option<&Value> {
        self.after.as_ref().and_then(|v| v.get(field))
    }

    /// Whether the given field differs between before and after.
    #[must_use]
    pub fn field_changed(&self, field: &str) -> bool {
        self.field_before(field) != self.field_after(field)
    }
}

/// What a transaction update function decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Leave the record untouched; the transaction does not commit.
    Abort,
    /// Replace the record with this value.
    Put(Value),
    /// Remove the record.
    Delete,
}

/// Broadcast side of the change feed, owned by each backend.
#[derive(Debug)]
pub(crate) struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, change: Change) {
        if change.before == change.after {
            return;
        }
        tracing::trace!(path = %change.path, "Publishing record change");
        // No subscribers is fine: nothing is listening for triggers yet.
        let _ = self.sender.send(change);
    }
}

/// Turn a mutation into the value that should be stored.
///
/// Records are JSON objects. Null fields are dropped and an empty object is
/// the same as no record at all.
pub(crate) fn normalize(path: &RecordPath, mutation: Mutation) -> Result<Option<Value>> {
    match mutation {
        Mutation::Abort | Mutation::Delete | Mutation::Put(Value::Null) => Ok(None),
        Mutation::Put(Value::Object(fields)) => {
            let fields: Map<String, Value> = fields
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect();
            if fields.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Value::Object(fields)))
            }
        }
        Mutation::Put(other) => Err(StoreError::InvalidValue {
            path: path.to_string(),
            reason: format!("records must be JSON objects, got {}", type_name(&other)),
        }),
    }
}

/// Merge fields into an existing record. A null field removes it.
pub(crate) fn merge(current: Option<&Value>, fields: Map<String, Value>) -> Value {
    let mut merged = match current {
        Some(Value::Object(existing)) => existing.clone(),
        _ => Map::new(),
    };
    for (name, value) in fields {
        if value.is_null() {
            merged.remove(&name);
        } else {
            merged.insert(name, value);
        }
    }
    Value::Object(merged)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
