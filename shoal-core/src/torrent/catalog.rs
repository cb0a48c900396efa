//! Torrent catalog: load/unload lifecycle and stored announce tiers.
//!
//! One record per infohash in `StorageCategory::Torrents`:
//! `{v, state, info, tiers}` where `info` holds the raw `info` bytes and
//! `tiers` the current (possibly reordered) tier list. Unloaded entries keep
//! only `{v, state}`.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use super::metainfo::MetaInfo;
use super::tiers::TierList;
use super::{InfoHash, TorrentError};
use crate::bencode::Value;
use crate::storage::record::{self, key};
use crate::storage::{KeyValueStore, StorageCategory};

const CATEGORY: StorageCategory = StorageCategory::Torrents;
const STATE_LOADED: &str = "loaded";
const STATE_UNLOADED: &str = "unloaded";

/// Lifecycle state of an infohash in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never loaded
    Absent,
    /// Loaded and readable
    Loaded,
    /// Previously loaded, now unloaded
    Unloaded,
}

enum StoredEntry {
    Loaded { raw_info: Bytes, tiers: TierList },
    Unloaded,
}

/// Owns torrent lifecycle records in the key-value store.
///
/// The catalog does not lock; callers serialize per infohash.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn KeyValueStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Registers already-parsed metainfo as `Loaded`.
    ///
    /// # Errors
    ///
    /// - `TorrentError::AlreadyLoaded` - The infohash is currently loaded
    /// - `TorrentError::Storage` - The store failed
    pub async fn load(&self, metainfo: &MetaInfo) -> Result<InfoHash, TorrentError> {
        let info_hash = metainfo.info_hash();
        if self.state(info_hash).await? == EntryState::Loaded {
            return Err(TorrentError::AlreadyLoaded { info_hash });
        }

        let entry = StoredEntry::Loaded {
            raw_info: metainfo.raw_info().clone(),
            tiers: metainfo.announce_tiers().clone(),
        };
        self.write(info_hash, &entry).await?;

        tracing::info!(
            "Loaded torrent {} with {} announce tiers",
            info_hash,
            metainfo.announce_tiers().tiers().len()
        );
        Ok(info_hash)
    }

    /// Marks a loaded torrent as `Unloaded`.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Absent or already unloaded
    /// - `TorrentError::Storage` - The store failed
    pub async fn unload(&self, info_hash: InfoHash) -> Result<(), TorrentError> {
        self.ensure_loaded(info_hash).await?;
        self.write(info_hash, &StoredEntry::Unloaded).await?;
        tracing::info!("Unloaded torrent {}", info_hash);
        Ok(())
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Storage` - The store failed or the record is corrupt
    pub async fn state(&self, info_hash: InfoHash) -> Result<EntryState, TorrentError> {
        Ok(match self.read(info_hash).await? {
            None => EntryState::Absent,
            Some(StoredEntry::Loaded { .. }) => EntryState::Loaded,
            Some(StoredEntry::Unloaded) => EntryState::Unloaded,
        })
    }

    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Absent or unloaded
    pub async fn ensure_loaded(&self, info_hash: InfoHash) -> Result<(), TorrentError> {
        match self.state(info_hash).await? {
            EntryState::Loaded => Ok(()),
            EntryState::Absent | EntryState::Unloaded => {
                Err(TorrentError::TorrentNotFound { info_hash })
            }
        }
    }

    /// The tier list exactly as currently stored.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Absent or unloaded
    pub async fn announce_tiers(&self, info_hash: InfoHash) -> Result<TierList, TorrentError> {
        self.loaded(info_hash).await.map(|(_, tiers)| tiers)
    }

    /// Replaces the stored tier list of a loaded torrent.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Absent or unloaded
    pub async fn replace_tiers(
        &self,
        info_hash: InfoHash,
        tiers: TierList,
    ) -> Result<(), TorrentError> {
        let (raw_info, _) = self.loaded(info_hash).await?;
        self.write(info_hash, &StoredEntry::Loaded { raw_info, tiers })
            .await
    }

    /// Metainfo view whose tiers reflect any reordering since load.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TorrentNotFound` - Absent or unloaded
    pub async fn metainfo(&self, info_hash: InfoHash) -> Result<MetaInfo, TorrentError> {
        let (raw_info, tiers) = self.loaded(info_hash).await?;
        MetaInfo::from_raw_info(raw_info, tiers)
    }

    async fn loaded(&self, info_hash: InfoHash) -> Result<(Bytes, TierList), TorrentError> {
        match self.read(info_hash).await? {
            Some(StoredEntry::Loaded { raw_info, tiers }) => Ok((raw_info, tiers)),
            _ => Err(TorrentError::TorrentNotFound { info_hash }),
        }
    }

    async fn read(&self, info_hash: InfoHash) -> Result<Option<StoredEntry>, TorrentError> {
        let storage_key = info_hash.to_hex();
        let Some(bytes) = self.store.get(CATEGORY, &storage_key).await? else {
            return Ok(None);
        };

        let value = record::open(CATEGORY, &storage_key, &bytes)?;
        let malformed = |reason: &str| record::malformed(CATEGORY, &storage_key, reason);

        match value.get(b"state").and_then(Value::as_str) {
            Some(STATE_UNLOADED) => Ok(Some(StoredEntry::Unloaded)),
            Some(STATE_LOADED) => {
                let raw_info = value
                    .get(b"info")
                    .and_then(Value::as_bytes)
                    .cloned()
                    .ok_or_else(|| malformed("missing info"))?;
                let tiers = value
                    .get(b"tiers")
                    .and_then(TierList::from_value)
                    .ok_or_else(|| malformed("missing tiers"))?;
                Ok(Some(StoredEntry::Loaded { raw_info, tiers }))
            }
            _ => Err(malformed("unknown state").into()),
        }
    }

    async fn write(&self, info_hash: InfoHash, entry: &StoredEntry) -> Result<(), TorrentError> {
        let mut fields = BTreeMap::new();
        match entry {
            StoredEntry::Loaded { raw_info, tiers } => {
                fields.insert(key("state"), Value::string(STATE_LOADED));
                fields.insert(key("info"), Value::Bytes(raw_info.clone()));
                fields.insert(key("tiers"), tiers.to_value());
            }
            StoredEntry::Unloaded => {
                fields.insert(key("state"), Value::string(STATE_UNLOADED));
            }
        }

        self.store
            .put(CATEGORY, &info_hash.to_hex(), record::seal(fields))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const TORRENT: &[u8] = b"d13:announce-listll19:http://one/announce19:http://two/announceel21:http://three/announceee4:infod4:name1:xee";

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let catalog = catalog();
        let metainfo = MetaInfo::from_bytes(TORRENT).unwrap();
        let info_hash = metainfo.info_hash();

        assert_eq!(catalog.state(info_hash).await.unwrap(), EntryState::Absent);
        assert_eq!(catalog.load(&metainfo).await.unwrap(), info_hash);
        assert_eq!(catalog.state(info_hash).await.unwrap(), EntryState::Loaded);

        assert!(matches!(
            catalog.load(&metainfo).await,
            Err(TorrentError::AlreadyLoaded { .. })
        ));

        catalog.unload(info_hash).await.unwrap();
        assert_eq!(catalog.state(info_hash).await.unwrap(), EntryState::Unloaded);
        assert!(matches!(
            catalog.unload(info_hash).await,
            Err(TorrentError::TorrentNotFound { .. })
        ));
        assert!(matches!(
            catalog.announce_tiers(info_hash).await,
            Err(TorrentError::TorrentNotFound { .. })
        ));

        assert_eq!(catalog.load(&metainfo).await.unwrap(), info_hash);
    }

    #[tokio::test]
    async fn test_unload_absent_fails() {
        let result = catalog().unload(InfoHash::new([9; 20])).await;
        assert!(matches!(result, Err(TorrentError::TorrentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_replace_tiers_is_visible() {
        let catalog = catalog();
        let metainfo = MetaInfo::from_bytes(TORRENT).unwrap();
        let info_hash = catalog.load(&metainfo).await.unwrap();

        let mut tiers = catalog.announce_tiers(info_hash).await.unwrap();
        assert_eq!(tiers, *metainfo.announce_tiers());

        tiers.promote(0, 1);
        catalog.replace_tiers(info_hash, tiers.clone()).await.unwrap();

        assert_eq!(catalog.announce_tiers(info_hash).await.unwrap(), tiers);
        let view = catalog.metainfo(info_hash).await.unwrap();
        assert_eq!(view.announce_tiers(), &tiers);
        assert_eq!(view.info_hash(), info_hash);
    }

    #[tokio::test]
    async fn test_reload_restores_file_order() {
        let catalog = catalog();
        let metainfo = MetaInfo::from_bytes(TORRENT).unwrap();
        let info_hash = catalog.load(&metainfo).await.unwrap();

        let mut tiers = catalog.announce_tiers(info_hash).await.unwrap();
        tiers.promote(0, 1);
        catalog.replace_tiers(info_hash, tiers).await.unwrap();
        catalog.unload(info_hash).await.unwrap();
        catalog.load(&metainfo).await.unwrap();

        assert_eq!(
            catalog.announce_tiers(info_hash).await.unwrap(),
            *metainfo.announce_tiers()
        );
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let info_hash = InfoHash::new([3; 20]);
        store
            .put(CATEGORY, &info_hash.to_hex(), b"d5:state4:oddl1:vi1ee".to_vec())
            .await
            .unwrap();

        let result = Catalog::new(store).state(info_hash).await;
        assert!(matches!(result, Err(TorrentError::Storage(_))));
    }
}
