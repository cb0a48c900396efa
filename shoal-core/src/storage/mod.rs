//! Key-value storage collaborator for torrent, peer and statistics records.
//!
//! The engine only assumes atomic single-key reads and writes. Records are
//! scoped by category and keyed by the hex infohash; values are opaque blobs
//! (the components encode them with the bencode codec).

pub mod file_store;
pub mod memory_store;
pub mod record;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use std::fmt;

use async_trait::async_trait;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;

/// Logical record family a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageCategory {
    /// Lifecycle state, raw info dictionary and announce tiers
    Torrents,
    /// Known peers per torrent
    Peers,
    /// Per-tracker statistics per torrent
    Statistics,
}

impl StorageCategory {
    pub const ALL: [StorageCategory; 3] = [Self::Torrents, Self::Peers, Self::Statistics];

    /// Stable name used for directories and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageCategory::Torrents => "torrents",
            StorageCategory::Peers => "peers",
            StorageCategory::Statistics => "statistics",
        }
    }
}

impl fmt::Display for StorageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic per-key blob storage.
///
/// Implementations must make each `put` and `delete` atomic for its key.
/// No atomicity across keys or categories is assumed by callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If the backing medium failed
    async fn get(&self, category: StorageCategory, key: &str)
    -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If the backing medium failed
    async fn put(
        &self,
        category: StorageCategory,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If the backing medium failed
    async fn delete(&self, category: StorageCategory, key: &str) -> Result<(), StorageError>;
}

/// Errors that occur in the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Key cannot be mapped onto the backing medium
    #[error("Invalid storage key: {key}")]
    InvalidKey {
        /// The rejected key
        key: String,
    },

    /// Stored record could not be decoded
    #[error("Corrupt {category} record for {key}: {reason}")]
    CorruptRecord {
        /// Category of the corrupt record
        category: StorageCategory,
        /// Key of the corrupt record
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
