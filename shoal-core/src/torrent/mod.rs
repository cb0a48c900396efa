//! Torrent identity, metainfo parsing and the torrent catalog.

pub mod catalog;
pub mod locks;
pub mod metainfo;
pub mod tiers;

use std::fmt;
use std::str::FromStr;

pub use catalog::{Catalog, EntryState};
pub use locks::TorrentLocks;
pub use metainfo::MetaInfo;
pub use tiers::{TierList, TrackerSlot};

use crate::storage::StorageError;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte digest of the exact bencoded bytes of a metainfo file's `info`
/// dictionary. Displays as 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub const fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses the 40-character hex form.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidInfoHash` - Not 40 hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self, TorrentError> {
        let mut hash = [0u8; 20];
        hex::decode_to_slice(hex_str, &mut hash).map_err(|_| TorrentError::InvalidInfoHash {
            value: hex_str.to_string(),
        })?;
        Ok(Self(hash))
    }

    /// Lowercase hex form, also used as the storage key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = TorrentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Errors surfaced by catalog, registry and tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    /// Malformed bencode or metainfo
    #[error("Failed to parse torrent file: {reason}")]
    InvalidTorrentFile { reason: String },

    /// The infohash is already in the `Loaded` state
    #[error("Torrent {info_hash} is already loaded")]
    AlreadyLoaded { info_hash: InfoHash },

    /// The infohash is absent or unloaded
    #[error("Torrent {info_hash} not found")]
    TorrentNotFound { info_hash: InfoHash },

    /// Every URL in every tier failed; carries the last failure reason
    #[error("All trackers failed: {reason}")]
    AllTrackersFailed { reason: String },

    #[error("Invalid infohash: {value:?}")]
    InvalidInfoHash { value: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TorrentError {
    /// Failure reason carried by `AllTrackersFailed`.
    pub fn tracker_reason(&self) -> Option<&str> {
        match self {
            TorrentError::AllTrackersFailed { reason } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_info_hash_hex_parsing() {
        let parsed: InfoHash = "5a8062c076fa85e8056451c0d9aa04349ae27909".parse().unwrap();
        assert_eq!(parsed.to_hex(), "5a8062c076fa85e8056451c0d9aa04349ae27909");
        assert_eq!(parsed.as_bytes()[0], 0x5a);

        assert!(matches!(
            InfoHash::from_hex("5a80"),
            Err(TorrentError::InvalidInfoHash { .. })
        ));
        assert!(InfoHash::from_hex("zz8062c076fa85e8056451c0d9aa04349ae27909").is_err());
    }

    #[test]
    fn test_tracker_reason() {
        let error = TorrentError::AllTrackersFailed {
            reason: "Connection failed".to_string(),
        };
        assert_eq!(error.tracker_reason(), Some("Connection failed"));
        assert_eq!(error.to_string(), "All trackers failed: Connection failed");
    }
}
