//! Per-tracker statistics with last-known-value semantics.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::bencode::Value;
use crate::storage::record::{self, key};
use crate::storage::{KeyValueStore, StorageCategory, StorageError};
use crate::torrent::InfoHash;

const CATEGORY: StorageCategory = StorageCategory::Statistics;

/// Latest known state of one tracker URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeData {
    /// Peers with the complete torrent (`complete`)
    pub seeders: u64,
    /// Peers still downloading (`incomplete`)
    pub leechers: u64,
    /// Completed downloads reported by the tracker
    pub downloaded: u64,
    /// Last announce interval in seconds
    pub interval: u64,
    /// Set while the most recent contact failed
    pub failure_reason: Option<String>,
}

impl ScrapeData {
    pub fn is_failed(&self) -> bool {
        self.failure_reason.is_some()
    }

    fn apply(&mut self, update: &ScrapeUpdate) {
        if let Some(seeders) = update.seeders {
            self.seeders = seeders;
        }
        if let Some(leechers) = update.leechers {
            self.leechers = leechers;
        }
        if let Some(downloaded) = update.downloaded {
            self.downloaded = downloaded;
        }
        if let Some(interval) = update.interval {
            self.interval = interval;
        }
        self.failure_reason = match &update.outcome {
            TrackerOutcome::Success => None,
            TrackerOutcome::Failure(reason) => Some(reason.clone()),
        };
    }

    fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert(key("complete"), counter(self.seeders));
        fields.insert(key("incomplete"), counter(self.leechers));
        fields.insert(key("downloaded"), counter(self.downloaded));
        fields.insert(key("interval"), counter(self.interval));
        if let Some(reason) = &self.failure_reason {
            fields.insert(key("failure reason"), Value::string(reason));
        }
        Value::Dict(fields)
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            seeders: value.get(b"complete")?.as_u64()?,
            leechers: value.get(b"incomplete")?.as_u64()?,
            downloaded: value.get(b"downloaded")?.as_u64()?,
            interval: value.get(b"interval")?.as_u64()?,
            failure_reason: value
                .get(b"failure reason")
                .and_then(Value::as_bytes)
                .map(|reason| String::from_utf8_lossy(reason).into_owned()),
        })
    }
}

fn counter(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Whether a tracker contact succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerOutcome {
    Success,
    Failure(String),
}

/// Partial statistics from one response. `None` fields keep their stored
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeUpdate {
    pub seeders: Option<u64>,
    pub leechers: Option<u64>,
    pub downloaded: Option<u64>,
    pub interval: Option<u64>,
    pub outcome: TrackerOutcome,
}

impl ScrapeUpdate {
    /// A successful contact carrying no counters yet.
    pub fn success() -> Self {
        Self {
            seeders: None,
            leechers: None,
            downloaded: None,
            interval: None,
            outcome: TrackerOutcome::Success,
        }
    }

    /// A failed contact; counters from earlier successes stay visible.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            outcome: TrackerOutcome::Failure(reason.into()),
            ..Self::success()
        }
    }
}

/// Persists per-tracker statistics of each torrent.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn KeyValueStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Merges one response for `tracker_url` into the stored record.
    ///
    /// # Errors
    ///
    /// - `StorageError` - The store failed or the record is corrupt
    pub async fn update(
        &self,
        info_hash: InfoHash,
        tracker_url: &str,
        update: &ScrapeUpdate,
    ) -> Result<ScrapeData, StorageError> {
        let mut stats = self.load(info_hash).await?;
        let entry = stats.entry(tracker_url.to_string()).or_default();
        entry.apply(update);
        let merged = entry.clone();

        self.save(info_hash, &stats).await?;
        tracing::debug!("Updated stats for {} on {}: {:?}", tracker_url, info_hash, merged);
        Ok(merged)
    }

    /// Every tracker URL contacted at least once, success or failure.
    ///
    /// # Errors
    ///
    /// - `StorageError` - The store failed or the record is corrupt
    pub async fn snapshot(
        &self,
        info_hash: InfoHash,
    ) -> Result<BTreeMap<String, ScrapeData>, StorageError> {
        self.load(info_hash).await
    }

    /// # Errors
    ///
    /// - `StorageError` - The store failed
    pub async fn clear(&self, info_hash: InfoHash) -> Result<(), StorageError> {
        self.store.delete(CATEGORY, &info_hash.to_hex()).await
    }

    async fn load(
        &self,
        info_hash: InfoHash,
    ) -> Result<BTreeMap<String, ScrapeData>, StorageError> {
        let storage_key = info_hash.to_hex();
        let Some(bytes) = self.store.get(CATEGORY, &storage_key).await? else {
            return Ok(BTreeMap::new());
        };

        let value = record::open(CATEGORY, &storage_key, &bytes)?;
        let trackers = value
            .get(b"trackers")
            .and_then(Value::as_dict)
            .ok_or_else(|| record::malformed(CATEGORY, &storage_key, "missing trackers"))?;

        trackers
            .iter()
            .map(|(url, entry)| {
                let url = std::str::from_utf8(url).ok();
                match (url, ScrapeData::from_value(entry)) {
                    (Some(url), Some(data)) => Ok((url.to_string(), data)),
                    _ => Err(record::malformed(
                        CATEGORY,
                        &storage_key,
                        "invalid tracker entry",
                    )),
                }
            })
            .collect()
    }

    async fn save(
        &self,
        info_hash: InfoHash,
        stats: &BTreeMap<String, ScrapeData>,
    ) -> Result<(), StorageError> {
        let trackers = stats
            .iter()
            .map(|(url, data)| (Bytes::copy_from_slice(url.as_bytes()), data.to_value()))
            .collect();

        let mut fields = BTreeMap::new();
        fields.insert(key("trackers"), Value::Dict(trackers));
        self.store
            .put(CATEGORY, &info_hash.to_hex(), record::seal(fields))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const HASH: InfoHash = InfoHash::new([7; 20]);
    const URL: &str = "http://tracker.example/announce";

    fn aggregator() -> StatsAggregator {
        StatsAggregator::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_missing_fields_default_to_zero() {
        let stats = aggregator();
        let update = ScrapeUpdate {
            interval: Some(1800),
            ..ScrapeUpdate::success()
        };
        let data = stats.update(HASH, URL, &update).await.unwrap();

        assert_eq!(
            data,
            ScrapeData {
                interval: 1800,
                ..ScrapeData::default()
            }
        );
    }

    #[tokio::test]
    async fn test_absent_fields_retain_last_value() {
        let stats = aggregator();
        let first = ScrapeUpdate {
            seeders: Some(5),
            leechers: Some(3),
            downloaded: Some(40),
            interval: Some(900),
            outcome: TrackerOutcome::Success,
        };
        stats.update(HASH, URL, &first).await.unwrap();

        let second = ScrapeUpdate {
            leechers: Some(0),
            ..ScrapeUpdate::success()
        };
        let data = stats.update(HASH, URL, &second).await.unwrap();

        assert_eq!(data.seeders, 5);
        assert_eq!(data.leechers, 0);
        assert_eq!(data.downloaded, 40);
        assert_eq!(data.interval, 900);
    }

    #[tokio::test]
    async fn test_failure_keeps_counters_until_next_success() {
        let stats = aggregator();
        let success = ScrapeUpdate {
            seeders: Some(9),
            ..ScrapeUpdate::success()
        };
        stats.update(HASH, URL, &success).await.unwrap();

        let failed = stats
            .update(HASH, URL, &ScrapeUpdate::failure("Connection failed"))
            .await
            .unwrap();
        assert_eq!(failed.seeders, 9);
        assert_eq!(failed.failure_reason.as_deref(), Some("Connection failed"));

        let recovered = stats
            .update(HASH, URL, &ScrapeUpdate::success())
            .await
            .unwrap();
        assert_eq!(recovered.seeders, 9);
        assert!(!recovered.is_failed());
    }

    #[tokio::test]
    async fn test_snapshot_only_lists_contacted_urls() {
        let stats = aggregator();
        assert!(stats.snapshot(HASH).await.unwrap().is_empty());

        stats
            .update(HASH, "http://a/announce", &ScrapeUpdate::failure("boom"))
            .await
            .unwrap();
        stats
            .update(HASH, "http://b/announce", &ScrapeUpdate::success())
            .await
            .unwrap();

        let snapshot = stats.snapshot(HASH).await.unwrap();
        assert_eq!(
            snapshot.keys().collect::<Vec<_>>(),
            vec!["http://a/announce", "http://b/announce"]
        );
        assert_eq!(snapshot["http://a/announce"].failure_reason.as_deref(), Some("boom"));

        stats.clear(HASH).await.unwrap();
        assert!(stats.snapshot(HASH).await.unwrap().is_empty());
    }
}
