//! services/chat_widget/src/adapters/file_storage.rs
//!
//! This module contains the durable client-local storage adapter. It
//! implements the `SessionStorage` port with one JSON object file on disk,
//! standing in for the browser's local storage in desktop embeddings and in
//! tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use support_chat_core::ports::{PortError, PortResult, SessionStorage, StorageKey};
use tokio::sync::Mutex;

/// An adapter that implements `SessionStorage` with a single `state.json`
/// file under the configured storage directory.
///
/// Every operation is read-modify-write under one lock, which gives the
/// "last writer wins per key" discipline the engine expects. IO failures map
/// to `PortError::Unavailable` so the session store can degrade to in-memory
/// state.
pub struct FileStorageAdapter {
    path: PathBuf,
    // Serializes read-modify-write cycles against the state file.
    guard: Mutex<()>,
}

impl FileStorageAdapter {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            path: storage_dir.join("state.json"),
            guard: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> PortResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| PortError::Unavailable(format!("corrupt state file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(PortError::Unavailable(format!(
                "cannot read state file: {}",
                e
            ))),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PortError::Unavailable(format!("cannot create storage directory: {}", e))
            })?;
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| PortError::Unavailable(format!("cannot write state file: {}", e)))
    }
}

#[async_trait]
impl SessionStorage for FileStorageAdapter {
    async fn load(&self, key: StorageKey) -> PortResult<Option<String>> {
        let _guard = self.guard.lock().await;
        Ok(self.read_map().await?.remove(key.as_str()))
    }

    async fn store(&self, key: StorageKey, value: &str) -> PortResult<()> {
        let _guard = self.guard.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.as_str().to_string(), value.to_string());
        self.write_map(&map).await
    }

    async fn remove(&self, key: StorageKey) -> PortResult<()> {
        let _guard = self.guard.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key.as_str()).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorageAdapter::new(dir.path());

        storage
            .store(StorageKey::SessionId, "sess-123")
            .await
            .unwrap();
        assert_eq!(
            storage.load(StorageKey::SessionId).await.unwrap(),
            Some("sess-123".to_string())
        );

        // Values survive a fresh adapter over the same directory (a reload).
        let reopened = FileStorageAdapter::new(dir.path());
        assert_eq!(
            reopened.load(StorageKey::SessionId).await.unwrap(),
            Some("sess-123".to_string())
        );
    }

    #[tokio::test]
    async fn remove_clears_only_the_given_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorageAdapter::new(dir.path());

        storage.store(StorageKey::SessionId, "sess-1").await.unwrap();
        storage.store(StorageKey::Language, "kz").await.unwrap();
        storage.remove(StorageKey::SessionId).await.unwrap();

        assert_eq!(storage.load(StorageKey::SessionId).await.unwrap(), None);
        assert_eq!(
            storage.load(StorageKey::Language).await.unwrap(),
            Some("kz".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_stores_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let storage = std::sync::Arc::new(FileStorageAdapter::new(dir.path()));

        let (a, b) = tokio::join!(
            storage.store(StorageKey::SessionId, "sess-1"),
            storage.store(StorageKey::Language, "ru"),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(
            storage.load(StorageKey::SessionId).await.unwrap(),
            Some("sess-1".to_string())
        );
        assert_eq!(
            storage.load(StorageKey::Language).await.unwrap(),
            Some("ru".to_string())
        );
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorageAdapter::new(dir.path());
        assert_eq!(storage.load(StorageKey::Timeline).await.unwrap(), None);
    }
}
