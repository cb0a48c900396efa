//! Peer registry: deduplicated, numerically ordered peers per torrent.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;

use crate::bencode::Value;
use crate::storage::record::{self, key};
use crate::storage::{KeyValueStore, StorageCategory, StorageError};
use crate::torrent::InfoHash;

const CATEGORY: StorageCategory = StorageCategory::Peers;

/// A peer learned from a tracker.
///
/// Identity is `(ip, port)`; the optional peer id is carried along but never
/// compared. Orders by numeric address (IPv4 before IPv6), then port.
#[derive(Debug, Clone)]
pub struct KnownPeer {
    pub ip: IpAddr,
    pub port: u16,
    pub peer_id: Option<[u8; 20]>,
}

impl KnownPeer {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            peer_id: None,
        }
    }

    pub fn with_peer_id(mut self, peer_id: [u8; 20]) -> Self {
        self.peer_id = Some(peer_id);
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    fn identity(&self) -> (IpAddr, u16) {
        (self.ip, self.port)
    }

    fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert(key("ip"), Value::string(&self.ip.to_string()));
        fields.insert(key("port"), Value::Integer(i64::from(self.port)));
        if let Some(peer_id) = self.peer_id {
            fields.insert(key("peer id"), Value::Bytes(Bytes::copy_from_slice(&peer_id)));
        }
        Value::Dict(fields)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let ip = value.get(b"ip")?.as_str()?.parse().ok()?;
        let port = u16::try_from(value.get(b"port")?.as_integer()?).ok()?;
        let peer_id = value
            .get(b"peer id")
            .and_then(Value::as_bytes)
            .and_then(|bytes| <[u8; 20]>::try_from(bytes.as_ref()).ok());
        Some(Self { ip, port, peer_id })
    }
}

impl From<SocketAddr> for KnownPeer {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl PartialEq for KnownPeer {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for KnownPeer {}

impl Hash for KnownPeer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for KnownPeer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KnownPeer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

/// Persists the known-peer set of each torrent.
///
/// Callers hold the torrent's lock; each method is a single read-modify-write
/// of one record, so re-applying a merge after a restart is harmless.
#[derive(Clone)]
pub struct PeerRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl PeerRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Adds peers not already known. Existing entries, including their
    /// first-seen peer id, are left untouched.
    ///
    /// Returns how many peers were new.
    ///
    /// # Errors
    ///
    /// - `StorageError` - The store failed or the record is corrupt
    pub async fn merge(
        &self,
        info_hash: InfoHash,
        new_peers: impl IntoIterator<Item = KnownPeer>,
    ) -> Result<usize, StorageError> {
        let mut peers = self.load(info_hash).await?;
        let before = peers.len();
        for peer in new_peers {
            peers.entry(peer.identity()).or_insert(peer);
        }

        let added = peers.len() - before;
        if added > 0 {
            self.save(info_hash, &peers).await?;
        }
        tracing::debug!("Merged {} new peers for {} ({} known)", added, info_hash, peers.len());
        Ok(added)
    }

    /// Removes a peer if present. Returns whether it was known.
    ///
    /// # Errors
    ///
    /// - `StorageError` - The store failed or the record is corrupt
    pub async fn invalidate(
        &self,
        info_hash: InfoHash,
        peer: &KnownPeer,
    ) -> Result<bool, StorageError> {
        let mut peers = self.load(info_hash).await?;
        if peers.remove(&peer.identity()).is_none() {
            return Ok(false);
        }

        self.save(info_hash, &peers).await?;
        tracing::debug!("Invalidated peer {} for {}", peer.socket_addr(), info_hash);
        Ok(true)
    }

    /// All valid peers, ascending by numeric address then port.
    ///
    /// # Errors
    ///
    /// - `StorageError` - The store failed or the record is corrupt
    pub async fn list(&self, info_hash: InfoHash) -> Result<Vec<KnownPeer>, StorageError> {
        Ok(self.load(info_hash).await?.into_values().collect())
    }

    /// Forgets every peer of a torrent.
    ///
    /// # Errors
    ///
    /// - `StorageError` - The store failed
    pub async fn clear(&self, info_hash: InfoHash) -> Result<(), StorageError> {
        self.store.delete(CATEGORY, &info_hash.to_hex()).await
    }

    async fn load(
        &self,
        info_hash: InfoHash,
    ) -> Result<BTreeMap<(IpAddr, u16), KnownPeer>, StorageError> {
        let storage_key = info_hash.to_hex();
        let Some(bytes) = self.store.get(CATEGORY, &storage_key).await? else {
            return Ok(BTreeMap::new());
        };

        let value = record::open(CATEGORY, &storage_key, &bytes)?;
        let entries = value
            .get(b"peers")
            .and_then(Value::as_list)
            .ok_or_else(|| record::malformed(CATEGORY, &storage_key, "missing peers"))?;

        entries
            .iter()
            .map(|entry| {
                KnownPeer::from_value(entry)
                    .map(|peer| (peer.identity(), peer))
                    .ok_or_else(|| record::malformed(CATEGORY, &storage_key, "invalid peer entry"))
            })
            .collect()
    }

    async fn save(
        &self,
        info_hash: InfoHash,
        peers: &BTreeMap<(IpAddr, u16), KnownPeer>,
    ) -> Result<(), StorageError> {
        let mut fields = BTreeMap::new();
        fields.insert(
            key("peers"),
            Value::List(peers.values().map(KnownPeer::to_value).collect()),
        );
        self.store
            .put(CATEGORY, &info_hash.to_hex(), record::seal(fields))
            .await
    }
}
