//! In-memory key-value store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KeyValueStore, StorageCategory, StorageError};

/// Process-local store backed by a locked hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(StorageCategory, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held across all categories.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(
        &self,
        category: StorageCategory,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.records.read().get(&(category, key.to_string())).cloned())
    }

    async fn put(
        &self,
        category: StorageCategory,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.records.write().insert((category, key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, category: StorageCategory, key: &str) -> Result<(), StorageError> {
        self.records.write().remove(&(category, key.to_string()));
        Ok(())
    }
}
