//! Test fixtures for storage testing.

use super::FileStore;

/// Creates a `FileStore` rooted in a fresh temporary directory.
///
/// The returned `TempDir` must be kept alive for the store to remain valid.
///
/// # Panics
///
/// Panics if the temporary directory or store cannot be created.
pub async fn create_temp_file_store() -> (tempfile::TempDir, FileStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(temp_dir.path().join("store")).await.unwrap();
    (temp_dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_file_store_creates_category_dirs() {
        let (_temp_dir, store) = create_temp_file_store().await;

        for category in crate::storage::StorageCategory::ALL {
            assert!(store.root().join(category.as_str()).is_dir());
        }
    }
}
