//! Key encoding utilities for `RocksDB`.
//!
//! Keys within a collection's column family are `version || '/' || key`, so a
//! prefix scan over `version/` lists one schema generation in key order.

use border_core::{RecordKey, RecordPath, SchemaVersion};

/// Create the storage key for a record.
#[must_use]
pub fn record_key(path: &RecordPath) -> Vec<u8> {
    let mut key = version_prefix(&path.version);
    key.extend_from_slice(path.key.as_str().as_bytes());
    key
}

/// Create a prefix for iterating all records of a schema version.
#[must_use]
pub fn version_prefix(version: &SchemaVersion) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(version.as_str().len() + 1);
    prefix.extend_from_slice(version.as_str().as_bytes());
    prefix.push(b'/');
    prefix
}

/// Extract the record key from a storage key that starts with `prefix`.
///
/// Returns `None` for keys outside the prefix or that are not valid keys.
#[must_use]
pub fn extract_record_key(prefix: &[u8], key: &[u8]) -> Option<RecordKey> {
    let rest = key.strip_prefix(prefix)?;
    let text = std::str::from_utf8(rest).ok()?;
    RecordKey::new(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use border_core::Collection;

    #[test]
    fn record_key_format() {
        let version = SchemaVersion::new("v1").unwrap();
        let path = version.record(Collection::Charge, &RecordKey::new("ch_1").unwrap());
        assert_eq!(record_key(&path), b"v1/ch_1".to_vec());
    }

    #[test]
    fn extract_record_key_roundtrip() {
        let version = SchemaVersion::new("v1").unwrap();
        let key = RecordKey::new("src_1").unwrap();
        let path = version.record(Collection::Source, &key);

        let extracted = extract_record_key(&version_prefix(&version), &record_key(&path));
        assert_eq!(extracted, Some(key));
    }

    #[test]
    fn prefix_does_not_match_other_versions() {
        let v1 = SchemaVersion::new("v1").unwrap();
        let v10 = SchemaVersion::new("v10").unwrap();
        let path = v10.record(Collection::User, &RecordKey::new("u").unwrap());

        assert!(!record_key(&path).starts_with(&version_prefix(&v1)));
    }
}
