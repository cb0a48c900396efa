//! Client facade over catalog, tracker engine, peers and statistics.
//!
//! Every operation holds the per-infohash lock for its whole duration, so
//! no caller observes a half-updated tier list, peer set or statistics map.
//! Operations on different torrents run concurrently.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ShoalConfig, UnloadPolicy};
use crate::peers::{KnownPeer, PeerRegistry};
use crate::stats::{ScrapeData, StatsAggregator};
use crate::storage::{FileStore, KeyValueStore};
use crate::torrent::{Catalog, EntryState, InfoHash, MetaInfo, TorrentError, TorrentLocks};
use crate::tracker::{
    AnnounceEvent, PeerId, ReqwestTransport, TrackerEngine, TrackerTransport, TransferStats,
};

/// Client-side tracker engine for a set of torrents.
pub struct TorrentClient {
    catalog: Catalog,
    peers: PeerRegistry,
    stats: StatsAggregator,
    engine: TrackerEngine,
    locks: TorrentLocks,
    unload_policy: UnloadPolicy,
}

impl TorrentClient {
    /// Wires the components over explicit storage and transport.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn TrackerTransport>,
        config: &ShoalConfig,
    ) -> Self {
        let catalog = Catalog::new(Arc::clone(&store));
        let peers = PeerRegistry::new(Arc::clone(&store));
        let stats = StatsAggregator::new(store);
        let engine = TrackerEngine::new(
            catalog.clone(),
            peers.clone(),
            stats.clone(),
            transport,
            config,
        );

        Self {
            catalog,
            peers,
            stats,
            engine,
            locks: TorrentLocks::new(),
            unload_policy: config.client.unload_policy,
        }
    }

    /// Opens a client persisting to `data_dir` and talking HTTP via reqwest.
    ///
    /// # Errors
    ///
    /// - `ShoalError::Storage` - Data directory cannot be prepared
    /// - `ShoalError::Transport` - HTTP client cannot be built
    pub async fn open(data_dir: impl Into<PathBuf>, config: &ShoalConfig) -> crate::Result<Self> {
        let store = FileStore::open(data_dir).await?;
        let transport = ReqwestTransport::new(&config.network)?;
        Ok(Self::new(Arc::new(store), Arc::new(transport), config))
    }

    /// The peer id announced to trackers.
    pub fn peer_id(&self) -> PeerId {
        self.engine.peer_id()
    }

    /// Loads a torrent file and returns its infohash.
    ///
    /// Reloading a previously unloaded torrent starts from empty peers and
    /// statistics unless the unload policy retains history.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - Malformed bencode or metainfo
    /// - `TorrentError::AlreadyLoaded` - Same infohash already loaded
    pub async fn load(&self, torrent_bytes: &[u8]) -> Result<InfoHash, TorrentError> {
        let metainfo = MetaInfo::from_bytes(torrent_bytes)?;
        let info_hash = metainfo.info_hash();
        let _guard = self.locks.acquire(info_hash).await;

        if self.catalog.state(info_hash).await? == EntryState::Loaded {
            return Err(TorrentError::AlreadyLoaded { info_hash });
        }
        if self.unload_policy == UnloadPolicy::ClearHistory {
            self.clear_history(info_hash).await?;
        }

        self.catalog.load(&metainfo).await
    }

    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Absent or already unloaded
    pub async fn unload(&self, info_hash: InfoHash) -> Result<(), TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;

        self.catalog.unload(info_hash).await?;
        if self.unload_policy == UnloadPolicy::ClearHistory {
            self.clear_history(info_hash).await?;
        }
        Ok(())
    }

    /// Current announce tiers, reflecting any shuffle or promotion.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    pub async fn announces(&self, info_hash: InfoHash) -> Result<Vec<Vec<String>>, TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        Ok(self.catalog.announce_tiers(info_hash).await?.into_inner())
    }

    /// Announces to the first responsive tracker and returns its interval
    /// in seconds.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    /// - `TorrentError::AllTrackersFailed` - No tracker answered
    pub async fn announce(
        &self,
        info_hash: InfoHash,
        event: AnnounceEvent,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> Result<u64, TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        let transfer = TransferStats {
            uploaded,
            downloaded,
            left,
        };
        self.engine.announce(info_hash, event, transfer).await
    }

    /// Scrapes every known tracker of the torrent.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    pub async fn scrape(&self, info_hash: InfoHash) -> Result<(), TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        self.engine.scrape(info_hash).await
    }

    /// Forgets a peer. Unknown peers are ignored.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    pub async fn invalidate_peer(
        &self,
        info_hash: InfoHash,
        peer: &KnownPeer,
    ) -> Result<(), TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        self.catalog.ensure_loaded(info_hash).await?;
        self.peers.invalidate(info_hash, peer).await?;
        Ok(())
    }

    /// Known peers in ascending numeric address order.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    pub async fn known_peers(&self, info_hash: InfoHash) -> Result<Vec<KnownPeer>, TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        self.catalog.ensure_loaded(info_hash).await?;
        Ok(self.peers.list(info_hash).await?)
    }

    /// Latest statistics per tracker URL ever contacted.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    pub async fn tracker_stats(
        &self,
        info_hash: InfoHash,
    ) -> Result<BTreeMap<String, ScrapeData>, TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        self.catalog.ensure_loaded(info_hash).await?;
        Ok(self.stats.snapshot(info_hash).await?)
    }

    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Torrent is not loaded
    pub async fn metainfo(&self, info_hash: InfoHash) -> Result<MetaInfo, TorrentError> {
        let _guard = self.locks.acquire(info_hash).await;
        self.catalog.metainfo(info_hash).await
    }

    async fn clear_history(&self, info_hash: InfoHash) -> Result<(), TorrentError> {
        self.peers.clear(info_hash).await?;
        self.stats.clear(info_hash).await?;
        tracing::debug!("Cleared peer and tracker history for {}", info_hash);
        Ok(())
    }
}
