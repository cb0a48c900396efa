//! Per-infohash critical sections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::InfoHash;

/// Serializes operations on the same infohash.
///
/// Operations on different infohashes never contend. Guards are held across
/// awaits, including tracker requests, so the map hands out async mutexes.
#[derive(Debug, Default)]
pub struct TorrentLocks {
    locks: Mutex<HashMap<InfoHash, Arc<AsyncMutex<()>>>>,
}

impl TorrentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `info_hash`.
    pub async fn acquire(&self, info_hash: InfoHash) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Drop idle entries so the map tracks only contended or active hashes.
            locks.retain(|hash, lock| *hash == info_hash || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(info_hash).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of infohashes with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_hash_is_exclusive() {
        let locks = Arc::new(TorrentLocks::new());
        let hash = InfoHash::new([1; 20]);

        let guard = locks.acquire(hash).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(hash).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_hashes_are_independent() {
        let locks = TorrentLocks::new();
        let _first = locks.acquire(InfoHash::new([1; 20])).await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(InfoHash::new([2; 20])),
        )
        .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = TorrentLocks::new();
        for byte in 0..5u8 {
            let _guard = locks.acquire(InfoHash::new([byte; 20])).await;
        }
        assert_eq!(locks.tracked(), 1);
    }
}
