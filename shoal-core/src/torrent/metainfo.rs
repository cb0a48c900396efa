//! Metainfo (".torrent" file) parsing and infohash calculation.

use bytes::Bytes;
use sha1::{Digest, Sha1};

use super::tiers::TierList;
use super::{InfoHash, TorrentError};
use crate::bencode::{self, Value};

/// Parsed torrent file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    info: Value,
    raw_info: Bytes,
    announce_tiers: TierList,
    info_hash: InfoHash,
}

impl MetaInfo {
    /// Parses metainfo from the bytes of a torrent file.
    ///
    /// Announce tiers come from `announce-list` when it yields at least one
    /// URL, otherwise from the lone `announce` URL. No shuffling happens here.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - Malformed bencode, non-dictionary
    ///   root, or missing/non-dictionary `info`
    pub fn from_bytes(torrent_bytes: &[u8]) -> Result<Self, TorrentError> {
        let root = bencode::decode(torrent_bytes).map_err(invalid)?;
        if root.as_dict().is_none() {
            return Err(TorrentError::InvalidTorrentFile {
                reason: "Root element must be dictionary".to_string(),
            });
        }

        let raw_info = info_bytes(torrent_bytes)?;
        let announce_tiers = extract_announce_tiers(&root);
        Self::from_raw_info(raw_info, announce_tiers)
    }

    /// Rebuilds metainfo from previously stored raw `info` bytes.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - `raw_info` is not a bencoded dictionary
    pub fn from_raw_info(
        raw_info: impl Into<Bytes>,
        announce_tiers: TierList,
    ) -> Result<Self, TorrentError> {
        let raw_info = raw_info.into();
        let info = bencode::decode(&raw_info).map_err(invalid)?;
        if info.as_dict().is_none() {
            return Err(TorrentError::InvalidTorrentFile {
                reason: "Info field must be dictionary".to_string(),
            });
        }

        Ok(Self {
            info_hash: digest(&raw_info),
            info,
            raw_info,
            announce_tiers,
        })
    }

    /// The decoded `info` dictionary.
    pub fn info(&self) -> &Value {
        &self.info
    }

    /// The `info` dictionary exactly as it appeared in the source bytes.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }

    /// Announce tiers carried with this view. Freshly parsed metainfo holds
    /// the file's order; a view rebuilt from the catalog holds the current,
    /// possibly shuffled or promoted, order.
    pub fn announce_tiers(&self) -> &TierList {
        &self.announce_tiers
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// The suggested file or directory name, when present and UTF-8.
    pub fn name(&self) -> Option<&str> {
        self.info.get(b"name").and_then(Value::as_str)
    }
}

/// Computes the infohash of a torrent file without building `MetaInfo`.
///
/// # Errors
///
/// - `TorrentError::InvalidTorrentFile` - Malformed bencode or missing `info`
pub fn compute_info_hash(torrent_bytes: &[u8]) -> Result<InfoHash, TorrentError> {
    info_bytes(torrent_bytes).map(|raw_info| digest(&raw_info))
}

fn info_bytes(torrent_bytes: &[u8]) -> Result<Bytes, TorrentError> {
    let raw_info = bencode::dict_entry_bytes(torrent_bytes, b"info")
        .map_err(invalid)?
        .ok_or_else(|| TorrentError::InvalidTorrentFile {
            reason: "Missing 'info' field".to_string(),
        })?;

    if raw_info.first() != Some(&b'd') {
        return Err(TorrentError::InvalidTorrentFile {
            reason: "Info field must be dictionary".to_string(),
        });
    }

    Ok(Bytes::copy_from_slice(raw_info))
}

fn digest(raw_info: &[u8]) -> InfoHash {
    let mut hasher = Sha1::new();
    hasher.update(raw_info);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&hasher.finalize());
    InfoHash::new(hash)
}

fn extract_announce_tiers(root: &Value) -> TierList {
    let from_list = root
        .get(b"announce-list")
        .and_then(TierList::from_value)
        .filter(|tiers| !tiers.is_empty());

    if let Some(tiers) = from_list {
        return tiers;
    }

    match root.get(b"announce").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => TierList::new(vec![vec![url.to_string()]]),
        _ => TierList::default(),
    }
}

fn invalid(error: bencode::BencodeError) -> TorrentError {
    TorrentError::InvalidTorrentFile {
        reason: format!("Bencode parsing failed: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SINGLE_TRACKER: &[u8] = b"d8:announce35:http://tracker.example.com/announce4:infod6:lengthi1000e4:name8:test.txt12:piece lengthi32768e6:pieces20:12345678901234567890ee";

    fn sha1_hex(bytes: &[u8]) -> String {
        hex::encode(Sha1::digest(bytes))
    }

    #[test]
    fn test_info_hash_covers_exact_info_bytes() {
        let metainfo = MetaInfo::from_bytes(SINGLE_TRACKER).unwrap();
        let expected = sha1_hex(
            b"d6:lengthi1000e4:name8:test.txt12:piece lengthi32768e6:pieces20:12345678901234567890e",
        );
        assert_eq!(metainfo.info_hash().to_hex(), expected);
        assert_eq!(compute_info_hash(SINGLE_TRACKER).unwrap(), metainfo.info_hash());
        assert_eq!(metainfo.name(), Some("test.txt"));
    }

    #[test]
    fn test_info_hash_independent_of_announce_keys() {
        let with_list = b"d8:announce19:http://one/announce13:announce-listll19:http://two/announceee4:infod6:lengthi1000e4:name8:test.txt12:piece lengthi32768e6:pieces20:12345678901234567890ee";
        assert_eq!(
            compute_info_hash(with_list).unwrap(),
            compute_info_hash(SINGLE_TRACKER).unwrap()
        );
    }

    #[test]
    fn test_non_canonical_info_hashes_source_bytes() {
        let unsorted = b"d4:infod4:name1:x6:lengthi5eee";
        let hash = compute_info_hash(unsorted).unwrap();
        assert_eq!(hash.to_hex(), sha1_hex(b"d4:name1:x6:lengthi5ee"));
    }

    #[test]
    fn test_single_announce_yields_one_tier() {
        let metainfo = MetaInfo::from_bytes(SINGLE_TRACKER).unwrap();
        assert_eq!(
            metainfo.announce_tiers().tiers(),
            &[vec!["http://tracker.example.com/announce".to_string()]]
        );
    }

    #[test]
    fn test_announce_list_takes_precedence() {
        let data = b"d8:announce19:http://one/announce13:announce-listll19:http://two/announce21:http://three/announceel19:udp://four/announceee4:infod4:name1:xee";
        let metainfo = MetaInfo::from_bytes(data).unwrap();
        assert_eq!(
            metainfo.announce_tiers().tiers(),
            &[
                vec![
                    "http://two/announce".to_string(),
                    "http://three/announce".to_string()
                ],
                vec!["udp://four/announce".to_string()],
            ]
        );
    }

    #[test]
    fn test_empty_announce_list_falls_back_to_announce() {
        let data = b"d8:announce19:http://one/announce13:announce-listllee4:infod4:name1:xee";
        let metainfo = MetaInfo::from_bytes(data).unwrap();
        assert_eq!(
            metainfo.announce_tiers().tiers(),
            &[vec!["http://one/announce".to_string()]]
        );
    }

    #[test]
    fn test_no_trackers_is_allowed() {
        let metainfo = MetaInfo::from_bytes(b"d4:infod4:name1:xee").unwrap();
        assert!(metainfo.announce_tiers().is_empty());
    }

    #[test]
    fn test_rejects_invalid_files() {
        let cases: [&[u8]; 7] = [
            b"",
            b"invalid torrent data",
            b"l4:teste",
            b"d8:announce9:test:8080e",
            b"d4:infoi42ee",
            b"d4:infod4:name1:x",
            b"d4:infod6:lengthi+5e4:name1:xee",
        ];
        for case in cases {
            assert!(
                matches!(
                    MetaInfo::from_bytes(case),
                    Err(TorrentError::InvalidTorrentFile { .. })
                ),
                "accepted {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_from_raw_info_matches_original() {
        let metainfo = MetaInfo::from_bytes(SINGLE_TRACKER).unwrap();
        let rebuilt = MetaInfo::from_raw_info(
            metainfo.raw_info().clone(),
            metainfo.announce_tiers().clone(),
        )
        .unwrap();
        assert_eq!(rebuilt, metainfo);
    }

    proptest! {
        #[test]
        fn prop_info_hash_depends_only_on_info(
            url in "http://[a-z]{1,12}/announce",
            name in "[a-z]{1,16}",
            length in 0u64..1_000_000,
        ) {
            let info = format!("d6:lengthi{}e4:name{}:{}e", length, name.len(), name);
            let torrent = format!("d8:announce{}:{}4:info{}e", url.len(), url, info);
            let hash = compute_info_hash(torrent.as_bytes()).unwrap();
            prop_assert_eq!(hash.to_hex(), sha1_hex(info.as_bytes()));
            prop_assert_eq!(hash, compute_info_hash(torrent.as_bytes()).unwrap());
        }
    }
}
