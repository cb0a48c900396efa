//! Directory-backed key-value store.
//!
//! Layout is `<root>/<category>/<key>`. Writes go to a temporary sibling
//! and are renamed into place, so a crash never leaves a half-written record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{KeyValueStore, StorageCategory, StorageError};

/// Persistent store writing one file per record.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `root`, creating category directories.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If a category directory cannot be created
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for category in StorageCategory::ALL {
            fs::create_dir_all(root.join(category.as_str())).await?;
        }
        tracing::debug!("Opened file store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, category: StorageCategory, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric());
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(category.as_str()).join(key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(
        &self,
        category: StorageCategory,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.record_path(category, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        category: StorageCategory,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError> {
        let path = self.record_path(category, key)?;
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, value).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, category: StorageCategory, key: &str) -> Result<(), StorageError> {
        let path = self.record_path(category, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_fixtures::create_temp_file_store;

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_temp_dir, store) = create_temp_file_store().await;

        store
            .put(StorageCategory::Torrents, "00ff", b"record".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.get(StorageCategory::Torrents, "00ff").await.unwrap(),
            Some(b"record".to_vec())
        );

        store.delete(StorageCategory::Torrents, "00ff").await.unwrap();
        assert_eq!(store.get(StorageCategory::Torrents, "00ff").await.unwrap(), None);
        store.delete(StorageCategory::Torrents, "00ff").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_without_leftover_temp_file() {
        let (_temp_dir, store) = create_temp_file_store().await;

        store
            .put(StorageCategory::Peers, "abcd", b"first".to_vec())
            .await
            .unwrap();
        store
            .put(StorageCategory::Peers, "abcd", b"second".to_vec())
            .await
            .unwrap();

        assert_eq!(
            store.get(StorageCategory::Peers, "abcd").await.unwrap(),
            Some(b"second".to_vec())
        );
        assert!(!store.root().join("peers").join("abcd.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (_temp_dir, store) = create_temp_file_store().await;

        let result = store.get(StorageCategory::Statistics, "../escape").await;
        assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
        let result = store.put(StorageCategory::Statistics, "", Vec::new()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
    }

    #[tokio::test]
    async fn test_reopen_sees_previous_records() {
        let (temp_dir, store) = create_temp_file_store().await;
        store
            .put(StorageCategory::Statistics, "beef", b"stats".to_vec())
            .await
            .unwrap();

        let reopened = FileStore::open(temp_dir.path().join("store")).await.unwrap();
        assert_eq!(
            reopened.get(StorageCategory::Statistics, "beef").await.unwrap(),
            Some(b"stats".to_vec())
        );
    }
}
