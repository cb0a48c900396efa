//! Versioned bencode record envelope shared by all categories.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::{StorageCategory, StorageError};
use crate::bencode::{self, Value};

/// Current record format version.
pub const RECORD_VERSION: i64 = 1;

const VERSION_KEY: &[u8] = b"v";

/// Wraps `fields` in a dictionary tagged with the record version.
pub fn seal(fields: BTreeMap<Bytes, Value>) -> Vec<u8> {
    let mut fields = fields;
    fields.insert(Bytes::from_static(VERSION_KEY), Value::Integer(RECORD_VERSION));
    bencode::encode(&Value::Dict(fields))
}

/// Decodes a sealed record and checks its version.
///
/// # Errors
///
/// - `StorageError::CorruptRecord` - Not bencode, not a dictionary, or an
///   unknown version
pub fn open(category: StorageCategory, key: &str, bytes: &[u8]) -> Result<Value, StorageError> {
    let corrupt = |reason: String| StorageError::CorruptRecord {
        category,
        key: key.to_string(),
        reason,
    };

    let value = bencode::decode(bytes).map_err(|e| corrupt(e.to_string()))?;
    match value.get(VERSION_KEY).and_then(Value::as_integer) {
        Some(RECORD_VERSION) => Ok(value),
        Some(other) => Err(corrupt(format!("unsupported record version {other}"))),
        None => Err(corrupt("missing record version".to_string())),
    }
}

/// Builds a `CorruptRecord` error for a record whose fields are malformed.
pub fn malformed(category: StorageCategory, key: &str, reason: &str) -> StorageError {
    StorageError::CorruptRecord {
        category,
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Dictionary key helper for building record fields.
pub fn key(name: &'static str) -> Bytes {
    Bytes::from_static(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_adds_version() {
        let mut fields = BTreeMap::new();
        fields.insert(key("state"), Value::string("loaded"));
        assert_eq!(seal(fields), b"d5:state6:loaded1:vi1ee".to_vec());
    }

    #[test]
    fn test_open_rejects_unknown_versions() {
        let result = open(StorageCategory::Peers, "k", b"d1:vi2ee");
        assert!(matches!(result, Err(StorageError::CorruptRecord { .. })));

        let result = open(StorageCategory::Peers, "k", b"de");
        assert!(matches!(result, Err(StorageError::CorruptRecord { .. })));

        let result = open(StorageCategory::Peers, "k", b"not bencode");
        assert!(matches!(result, Err(StorageError::CorruptRecord { .. })));
    }

    #[test]
    fn test_open_accepts_sealed_record() {
        let value = open(StorageCategory::Torrents, "k", &seal(BTreeMap::new())).unwrap();
        assert_eq!(value.get(b"v").and_then(Value::as_integer), Some(RECORD_VERSION));
    }
}
