use async_trait::async_trait;

use super::error::StorageError;
use crate::event::StorageKey;

/// Key-addressed object storage. Writes to an existing key replace it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` with the given content type.
    async fn put(&self, key: &StorageKey, data: &[u8], content_type: &str)
    -> Result<(), StorageError>;

    /// Retrieve all bytes stored under `key`.
    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError>;
}
