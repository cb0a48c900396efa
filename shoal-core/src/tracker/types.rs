//! Core types and enumerations for BitTorrent tracker communication

use super::peer_id::PeerId;
use super::protocol::constants;
use crate::peers::KnownPeer;
use crate::stats::{ScrapeUpdate, TrackerOutcome};
use crate::torrent::InfoHash;

/// Tracker announce request.
///
/// Contains client statistics and torrent information sent to tracker
/// during announce operations to report progress and request peer list.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    /// Unique identifier for the torrent being announced
    pub info_hash: InfoHash,
    /// Client's unique 20-byte identifier
    pub peer_id: PeerId,
    /// TCP port client is listening on for peer connections
    pub port: u16,
    /// Total bytes uploaded to other peers
    pub uploaded: u64,
    /// Total bytes downloaded from other peers
    pub downloaded: u64,
    /// Bytes remaining to download (0 for seeders)
    pub left: u64,
    /// Current client state for this torrent
    pub event: AnnounceEvent,
}

/// BitTorrent announce events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    /// Client started downloading this torrent; reshuffles the tiers
    Started,
    /// Client stopped downloading this torrent
    Stopped,
    /// Client completed downloading this torrent
    Completed,
    /// Periodic announce; sent without an `event` parameter
    Regular,
}

impl AnnounceEvent {
    /// Value of the `event` query parameter, if any.
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            AnnounceEvent::Started => Some("started"),
            AnnounceEvent::Stopped => Some("stopped"),
            AnnounceEvent::Completed => Some("completed"),
            AnnounceEvent::Regular => None,
        }
    }
}

/// Tracker announce response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    /// Seconds until next announce request should be sent
    pub interval: u64,
    /// Minimum allowed interval between announces
    pub min_interval: Option<u64>,
    /// Tracker-specific identifier for subsequent requests
    pub tracker_id: Option<String>,
    /// Non-fatal notice from the tracker
    pub warning_message: Option<String>,
    /// Number of seeders in the swarm
    pub complete: Option<u64>,
    /// Number of leechers in the swarm
    pub incomplete: Option<u64>,
    /// Completed downloads, reported by some trackers
    pub downloaded: Option<u64>,
    /// Peers from `peers` and `peers6`
    pub peers: Vec<KnownPeer>,
}

impl AnnounceResponse {
    /// Statistics carried by this response.
    pub fn stats_update(&self) -> ScrapeUpdate {
        ScrapeUpdate {
            seeders: self.complete,
            leechers: self.incomplete,
            downloaded: self.downloaded,
            interval: Some(self.interval),
            outcome: TrackerOutcome::Success,
        }
    }
}

/// Statistics for one torrent from a scrape response.
///
/// Fields the tracker omitted stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    /// Number of seeders (peers with complete file)
    pub complete: Option<u64>,
    /// Total number of completed downloads
    pub downloaded: Option<u64>,
    /// Number of leechers (peers downloading)
    pub incomplete: Option<u64>,
}

impl ScrapeStats {
    pub fn stats_update(&self) -> ScrapeUpdate {
        ScrapeUpdate {
            seeders: self.complete,
            leechers: self.incomplete,
            downloaded: self.downloaded,
            ..ScrapeUpdate::success()
        }
    }
}

/// Why a single tracker URL was skipped.
///
/// The `Display` form is the reason recorded in the tracker's statistics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerFailure {
    /// Connect error, I/O error or timeout
    #[error("{}", constants::CONNECTION_FAILED)]
    ConnectionFailed,

    /// The tracker answered with a `failure reason`
    #[error("{0}")]
    Rejected(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),

    /// No scrape URL can be derived from the announce URL
    #[error("Scrape not supported")]
    ScrapeUnsupported,
}

impl TrackerFailure {
    pub fn stats_update(&self) -> ScrapeUpdate {
        ScrapeUpdate::failure(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_query_values() {
        assert_eq!(AnnounceEvent::Started.query_value(), Some("started"));
        assert_eq!(AnnounceEvent::Stopped.query_value(), Some("stopped"));
        assert_eq!(AnnounceEvent::Completed.query_value(), Some("completed"));
        assert_eq!(AnnounceEvent::Regular.query_value(), None);
    }

    #[test]
    fn test_failure_reasons() {
        assert_eq!(TrackerFailure::ConnectionFailed.to_string(), "Connection failed");
        assert_eq!(
            TrackerFailure::Rejected("torrent not registered".to_string()).to_string(),
            "torrent not registered"
        );
        assert_eq!(TrackerFailure::HttpStatus(502).to_string(), "HTTP status 502");
        assert_eq!(TrackerFailure::ScrapeUnsupported.to_string(), "Scrape not supported");
    }

    #[test]
    fn test_announce_stats_update_keeps_missing_counters_absent() {
        let response = AnnounceResponse {
            interval: 900,
            min_interval: None,
            tracker_id: None,
            warning_message: None,
            complete: Some(4),
            incomplete: None,
            downloaded: None,
            peers: Vec::new(),
        };

        let update = response.stats_update();
        assert_eq!(update.seeders, Some(4));
        assert_eq!(update.leechers, None);
        assert_eq!(update.interval, Some(900));
        assert_eq!(update.outcome, TrackerOutcome::Success);
    }
}
