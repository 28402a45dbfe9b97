//! Persisted layout: schema versions, collections and record paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::{IdError, RecordKey};

/// Default schema generation.
pub const DEFAULT_SCHEMA_VERSION: &str = "v1";

/// Version prefix under which all collections live.
///
/// Several schema generations can share one database; each service instance
/// reads and writes only its own prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Create a schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is empty or contains `/`.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if value.contains('/') {
            return Err(IdError::PathSeparator(value));
        }
        Ok(Self(value))
    }

    /// Return the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a record under this version.
    #[must_use]
    pub fn record(&self, collection: Collection, key: &RecordKey) -> RecordPath {
        RecordPath {
            version: self.clone(),
            collection,
            key: key.clone(),
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self(DEFAULT_SCHEMA_VERSION.to_string())
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.0
    }
}

/// Top-level collections of the persisted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Links between users and remote payment customers.
    Customer,
    /// Identity-provider accounts.
    User,
    /// Tokenized payment methods.
    Source,
    /// Charge requests.
    Charge,
}

impl Collection {
    /// All collections, in layout order.
    pub const ALL: [Self; 4] = [Self::Customer, Self::User, Self::Source, Self::Charge];

    /// Path segment for this collection.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::User => "user",
            Self::Source => "source",
            Self::Charge => "charge",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCollection(s.to_string()))
    }
}

/// Location of a single record: `/{version}/{collection}/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordPath {
    /// Schema generation.
    pub version: SchemaVersion,
    /// Collection the record belongs to.
    pub collection: Collection,
    /// Record key within the collection.
    pub key: RecordKey,
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.version, self.collection, self.key)
    }
}
