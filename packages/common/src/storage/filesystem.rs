use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;

use super::error::StorageError;
use super::traits::ObjectStore;
use crate::event::StorageKey;

/// Filesystem-backed key-addressed object store.
///
/// Keys are opaque, so objects are laid out by the SHA-256 of the key:
/// `{base_path}/{first 2 hex chars}/{remaining 62 hex chars}`. Each file
/// holds the content type on its first line followed by the data, so one
/// rename publishes both.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn object_path(&self, key: &StorageKey) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_str().as_bytes()));
        self.base_path.join(&digest[..2]).join(&digest[2..])
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Content type recorded for `key` on its last write.
    pub async fn content_type(&self, key: &StorageKey) -> Result<String, StorageError> {
        self.read_object(key).await.map(|(content_type, _)| content_type)
    }

    async fn read_object(&self, key: &StorageKey) -> Result<(String, Vec<u8>), StorageError> {
        let mut raw = match fs::read(self.object_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let Some(split) = raw.iter().position(|b| *b == b'\n') else {
            return Err(corrupt(key));
        };
        let data = raw.split_off(split + 1);
        raw.truncate(split);
        let content_type = String::from_utf8(raw).map_err(|_| corrupt(key))?;
        Ok((content_type, data))
    }

    async fn write_atomic(&self, dest: &Path, data: &[u8]) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, dest).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn corrupt(key: &StorageKey) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("object '{key}' has no content type header"),
    ))
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(
        &self,
        key: &StorageKey,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        if content_type.contains('\n') {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "content type must be a single line",
            )));
        }

        let mut file = Vec::with_capacity(content_type.len() + 1 + data.len());
        file.extend_from_slice(content_type.as_bytes());
        file.push(b'\n');
        file.extend_from_slice(data);

        // Concurrent writers race; whichever rename lands last wins.
        self.write_atomic(&self.object_path(key), &file).await
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>, StorageError> {
        self.read_object(key).await.map(|(_, data)| data)
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.object_path(key)).await?)
    }

    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (FilesystemObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path().join("objects"), 10 * 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (store, _dir) = temp_store().await;
        let key = StorageKey::new("abc123");
        store.put(&key, b"hello world", "image/png").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"hello world");
        assert_eq!(store.content_type(&key).await.unwrap(), "image/png");
    }

    #[tokio::test]
    async fn put_overwrites_same_key() {
        let (store, _dir) = temp_store().await;
        let key = StorageKey::new("same");
        store.put(&key, b"first", "image/png").await.unwrap();
        store.put(&key, b"second", "image/jpeg").await.unwrap();

        assert_eq!(store.get(&key).await.unwrap(), b"second");
        assert_eq!(store.content_type(&key).await.unwrap(), "image/jpeg");
    }

    #[tokio::test]
    async fn keys_with_separators_stay_inside_root() {
        let (store, dir) = temp_store().await;
        let key = StorageKey::new("../../escape/attempt.png");
        store.put(&key, b"data", "image/png").await.unwrap();

        assert!(store.object_path(&key).starts_with(dir.path().join("objects")));
        assert_eq!(store.get(&key).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path().join("objects"), 10)
            .await
            .unwrap();

        let result = store
            .put(&StorageKey::new("big"), b"this is more than 10 bytes", "image/png")
            .await;
        assert!(matches!(
            result,
            Err(StorageError::SizeLimitExceeded { .. })
        ));
        assert!(!store.exists(&StorageKey::new("big")).await.unwrap());
    }

    #[tokio::test]
    async fn get_not_found() {
        let (store, _dir) = temp_store().await;
        let result = store.get(&StorageKey::new("nonexistent")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let (store, _dir) = temp_store().await;
        let key = StorageKey::new("delete-me");
        store.put(&key, b"bye", "image/gif").await.unwrap();

        assert!(store.delete(&key).await.unwrap());
        assert!(!store.exists(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_writers_leave_one_complete_object() {
        let (store, _dir) = temp_store().await;
        let store = std::sync::Arc::new(store);
        let key = StorageKey::new("raced");

        let mut handles = Vec::new();
        for i in 0..10u8 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.put(&key, &[i; 64], "image/png").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let data = store.get(&key).await.unwrap();
        assert_eq!(data.len(), 64);
        assert!(data.iter().all(|b| *b == data[0]));
    }

    #[tokio::test]
    async fn concurrent_writers_keep_data_and_type_together() {
        let (store, _dir) = temp_store().await;
        let store = std::sync::Arc::new(store);
        let key = StorageKey::new("raced-types");
        let types = ["image/png", "image/jpeg"];

        let mut handles = Vec::new();
        for i in 0..20u8 {
            let store = store.clone();
            let key = key.clone();
            let content_type = types[usize::from(i % 2)];
            handles.push(tokio::spawn(async move {
                store.put(&key, &[i % 2; 32], content_type).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let data = store.get(&key).await.unwrap();
        let content_type = store.content_type(&key).await.unwrap();
        assert_eq!(content_type, types[usize::from(data[0])]);
    }

    #[tokio::test]
    async fn multiline_content_type_is_rejected() {
        let (store, _dir) = temp_store().await;
        let key = StorageKey::new("bad-type");
        let result = store.put(&key, b"data", "image/png\nx").await;
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn constructor_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("deep/nested/objects");
        assert!(!base.exists());

        let _store = FilesystemObjectStore::new(base.clone(), 1024).await.unwrap();

        assert!(base.exists());
        assert!(base.join(".tmp").exists());
    }
}
