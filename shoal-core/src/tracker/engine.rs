//! Announce and scrape over a torrent's announce tiers.
//!
//! Announce walks (tier, position) slots in order and stops at the first
//! tracker that answers; scrape contacts every distinct URL concurrently.
//! Each tracker response is merged into the peer registry and statistics as
//! soon as it arrives, so an interrupted call keeps its partial progress.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::client::HttpTrackerClient;
use super::peer_id::PeerId;
use super::transport::TrackerTransport;
use super::types::{AnnounceEvent, AnnounceRequest};
use crate::config::ShoalConfig;
use crate::peers::PeerRegistry;
use crate::stats::{ScrapeUpdate, StatsAggregator};
use crate::torrent::{Catalog, InfoHash, TorrentError};

const NO_TRACKERS: &str = "No announce URLs available";

/// Transfer counters reported with an announce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

/// Drives tracker exchanges and feeds their results into the registries.
///
/// Does not lock; callers serialize operations per infohash.
pub struct TrackerEngine {
    catalog: Catalog,
    peers: PeerRegistry,
    stats: StatsAggregator,
    transport: Arc<dyn TrackerTransport>,
    peer_id: PeerId,
    listen_port: u16,
    timeout: Duration,
    rng: Mutex<ChaCha8Rng>,
}

impl TrackerEngine {
    pub fn new(
        catalog: Catalog,
        peers: PeerRegistry,
        stats: StatsAggregator,
        transport: Arc<dyn TrackerTransport>,
        config: &ShoalConfig,
    ) -> Self {
        let rng = match config.client.shuffle_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let peer_id = PeerId::generate(config.client.peer_id_prefix, &config.client.install_seed);
        tracing::debug!("Tracker engine using peer id {}", peer_id);

        Self {
            catalog,
            peers,
            stats,
            transport,
            peer_id,
            listen_port: config.client.listen_port,
            timeout: config.network.tracker_timeout,
            rng: Mutex::new(rng),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Announces to the first tracker that answers and returns its interval.
    ///
    /// A `Started` event first shuffles every tier and stores the new order.
    /// Each failed URL gets a failure statistic; the URL that answers is
    /// moved to the front of its tier.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    /// - `TorrentError::AllTrackersFailed` - Every URL failed; carries the last reason
    /// - `TorrentError::Storage` - The store failed
    pub async fn announce(
        &self,
        info_hash: InfoHash,
        event: AnnounceEvent,
        transfer: TransferStats,
    ) -> Result<u64, TorrentError> {
        let mut tiers = self.catalog.announce_tiers(info_hash).await?;

        if event == AnnounceEvent::Started {
            tiers.shuffle_within_tiers(&mut *self.rng.lock());
            self.catalog.replace_tiers(info_hash, tiers.clone()).await?;
            tracing::debug!("Shuffled announce tiers for {}: {:?}", info_hash, tiers.tiers());
        }

        let request = AnnounceRequest {
            info_hash,
            peer_id: self.peer_id,
            port: self.listen_port,
            uploaded: transfer.uploaded,
            downloaded: transfer.downloaded,
            left: transfer.left,
            event,
        };

        let slots: Vec<_> = tiers.slots().collect();
        let mut last_failure = None;

        for slot in slots {
            let client =
                HttpTrackerClient::new(slot.url.as_str(), Arc::clone(&self.transport), self.timeout);

            match client.announce(&request).await {
                Ok(response) => {
                    self.peers.merge(info_hash, response.peers.clone()).await?;
                    self.stats
                        .update(info_hash, &slot.url, &response.stats_update())
                        .await?;

                    if slot.position > 0 {
                        tiers.promote(slot.tier, slot.position);
                        self.catalog.replace_tiers(info_hash, tiers).await?;
                    }

                    tracing::info!(
                        "Announced {} to {} (tier {}): {} peers, interval {}s",
                        info_hash,
                        slot.url,
                        slot.tier,
                        response.peers.len(),
                        response.interval
                    );
                    return Ok(response.interval);
                }
                Err(failure) => {
                    tracing::warn!("Tracker {} failed for {}: {}", slot.url, info_hash, failure);
                    self.stats
                        .update(info_hash, &slot.url, &failure.stats_update())
                        .await?;
                    last_failure = Some(failure.to_string());
                }
            }
        }

        Err(TorrentError::AllTrackersFailed {
            reason: last_failure.unwrap_or_else(|| NO_TRACKERS.to_string()),
        })
    }

    /// Scrapes every distinct tracker URL of the torrent concurrently.
    ///
    /// Per-tracker failures are recorded in the statistics, never returned.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    /// - `TorrentError::Storage` - The store failed
    pub async fn scrape(&self, info_hash: InfoHash) -> Result<(), TorrentError> {
        let urls = self.catalog.announce_tiers(info_hash).await?.unique_urls();
        tracing::debug!("Scraping {} trackers for {}", urls.len(), info_hash);

        let mut pending: FuturesUnordered<_> = urls
            .into_iter()
            .map(|url| {
                let client = HttpTrackerClient::new(url, Arc::clone(&self.transport), self.timeout);
                async move {
                    let result = client.scrape(info_hash).await;
                    (client, result)
                }
            })
            .collect();

        while let Some((client, result)) = pending.next().await {
            let update = match result {
                Ok(Some(stats)) => stats.stats_update(),
                Ok(None) => ScrapeUpdate::success(),
                Err(failure) => {
                    tracing::warn!(
                        "Scrape of {} failed for {}: {}",
                        client.announce_url(),
                        info_hash,
                        failure
                    );
                    failure.stats_update()
                }
            };
            self.stats
                .update(info_hash, client.announce_url(), &update)
                .await?;
        }

        Ok(())
    }
}
