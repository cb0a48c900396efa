//! Shoal Core - client-side BitTorrent tracker engine
//!
//! Parses torrent metainfo, tracks loaded torrents and their announce tiers,
//! talks to HTTP trackers with BEP 12 failover, and keeps the resulting peer
//! and per-tracker statistics views.

pub mod bencode;
pub mod client;
pub mod config;
pub mod peers;
pub mod stats;
pub mod storage;
pub mod torrent;
pub mod tracing_setup;
pub mod tracker;

// Re-export main types for convenient access
pub use client::TorrentClient;
pub use config::{ShoalConfig, UnloadPolicy};
pub use peers::KnownPeer;
pub use stats::ScrapeData;
pub use storage::{KeyValueStore, StorageError};
pub use torrent::{InfoHash, TorrentError};
pub use tracker::{AnnounceEvent, TransportError};

/// Core errors that can bubble up from any Shoal subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ShoalError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ShoalError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ShoalError::Torrent(e) => match e {
                TorrentError::InvalidTorrentFile { reason } => {
                    format!("Invalid torrent file: {reason}")
                }
                TorrentError::AlreadyLoaded { info_hash } => {
                    format!("Torrent {info_hash} is already loaded")
                }
                TorrentError::TorrentNotFound { info_hash } => {
                    format!("Torrent {info_hash} not found")
                }
                TorrentError::AllTrackersFailed { reason } => {
                    format!("No tracker could be reached: {reason}")
                }
                TorrentError::InvalidInfoHash { value } => format!("Invalid infohash: {value}"),
                TorrentError::Storage(_) => "Storage error occurred".to_string(),
            },
            ShoalError::Storage(_) => "Storage error occurred".to_string(),
            ShoalError::Transport(_) => "Network error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ShoalError::Torrent(
                TorrentError::InvalidTorrentFile { .. }
                    | TorrentError::InvalidInfoHash { .. }
                    | TorrentError::AlreadyLoaded { .. }
                    | TorrentError::TorrentNotFound { .. }
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, ShoalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let error = ShoalError::from(TorrentError::AllTrackersFailed {
            reason: "Connection failed".to_string(),
        });
        assert_eq!(error.user_message(), "No tracker could be reached: Connection failed");
        assert!(!error.is_user_error());

        let error = ShoalError::from(TorrentError::InvalidTorrentFile {
            reason: "Missing 'info' field".to_string(),
        });
        assert!(error.is_user_error());
        assert_eq!(error.user_message(), "Invalid torrent file: Missing 'info' field");

        let error = ShoalError::from(TransportError::Timeout {
            url: "http://t/announce".to_string(),
        });
        assert_eq!(error.user_message(), "Network error occurred");
        assert!(!error.is_user_error());
    }

    #[test]
    fn test_info_hash_parse_errors_are_user_errors() {
        let error: ShoalError = "xyz".parse::<InfoHash>().unwrap_err().into();
        assert!(error.is_user_error());
    }

    #[test]
    fn test_storage_errors_are_not_user_errors() {
        let error = ShoalError::from(StorageError::InvalidKey {
            key: "../escape".to_string(),
        });
        assert_eq!(error.user_message(), "Storage error occurred");
        assert!(!error.is_user_error());
    }
}
