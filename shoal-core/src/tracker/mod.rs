//! BitTorrent HTTP tracker communication.
//!
//! Announce and scrape following BEP 3 and the BEP 12 multi-tracker
//! extension, over a pluggable HTTP transport.

pub mod client;
pub mod engine;
pub mod peer_id;
pub mod protocol;
#[cfg(any(test, feature = "test-utils"))]
pub mod simulated;
pub mod transport;
pub mod types;

// Re-export public API
pub use client::HttpTrackerClient;
pub use engine::{TrackerEngine, TransferStats};
pub use peer_id::PeerId;
#[cfg(any(test, feature = "test-utils"))]
pub use simulated::{SimulatedReply, SimulatedTransport};
pub use transport::{HttpResponse, ReqwestTransport, TrackerTransport, TransportError};
pub use types::{AnnounceEvent, AnnounceRequest, AnnounceResponse, ScrapeStats, TrackerFailure};
