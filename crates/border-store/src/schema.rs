//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage. Each
//! collection of the record tree gets its own column family; the schema
//! version is part of the key, not the column family name.

use border_core::Collection;

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Customer records, keyed by `version/key`.
    pub const CUSTOMER: &str = "customer";

    /// User records, keyed by `version/userID`.
    pub const USER: &str = "user";

    /// Payment source records, keyed by `version/sourceID`.
    pub const SOURCE: &str = "source";

    /// Charge records, keyed by `version/chargeID`.
    pub const CHARGE: &str = "charge";
}

/// Column family holding a collection.
#[must_use]
pub const fn column_family(collection: Collection) -> &'static str {
    match collection {
        Collection::Customer => cf::CUSTOMER,
        Collection::User => cf::USER,
        Collection::Source => cf::SOURCE,
        Collection::Charge => cf::CHARGE,
    }
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    Collection::ALL.into_iter().map(column_family).collect()
}
