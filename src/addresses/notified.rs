use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Addresses already surfaced to the chat.
///
/// Stored as a JSON array of strings. Persistence is optional: a memory-only
/// store forgets everything on restart.
#[derive(Debug, Default)]
pub struct NotifiedStore {
    path: Option<PathBuf>,
    addresses: HashSet<String>,
}

impl NotifiedStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the persisted set. A missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let addresses = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Notified-set file is corrupt, starting empty"
                    );
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read notified-set file, starting empty"
                );
                HashSet::new()
            }
        };

        tracing::info!(
            path = %path.display(),
            count = addresses.len(),
            "Loaded notified-set"
        );

        Self {
            path: Some(path),
            addresses,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Add a batch of addresses and persist before returning.
    ///
    /// The in-memory set is updated even when the write fails.
    pub async fn record(&mut self, addresses: &[String]) -> Result<()> {
        if addresses.is_empty() {
            return Ok(());
        }
        self.addresses.extend(addresses.iter().cloned());
        self.persist().await
    }

    /// Drop an address. Returns whether it was present.
    pub async fn forget(&mut self, address: &str) -> Result<bool> {
        if !self.addresses.remove(address) {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut list: Vec<&String> = self.addresses.iter().collect();
        list.sort();
        let json = serde_json::to_string_pretty(&list)?;

        // Write-then-rename so a crash never leaves a truncated file
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!(path = %path.display(), count = list.len(), "Persisted notified-set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_persists_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");

        let mut store = NotifiedStore::load(&path).await;
        assert!(store.is_empty());

        store
            .record(&["0xbbb".to_string(), "0xaaa".to_string()])
            .await
            .unwrap();

        let saved: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, vec!["0xaaa", "0xbbb"]);

        let reloaded = NotifiedStore::load(&path).await;
        assert!(reloaded.contains("0xaaa"));
        assert!(reloaded.contains("0xbbb"));
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = NotifiedStore::load(&path).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_forget_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");
        let mut store = NotifiedStore::load(&path).await;
        store.record(&["0xaaa".to_string()]).await.unwrap();

        assert!(store.forget("0xaaa").await.unwrap());
        assert!(!store.forget("0xaaa").await.unwrap());

        let saved: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_store_does_not_touch_disk() {
        let mut store = NotifiedStore::in_memory();
        store.record(&["0xaaa".to_string()]).await.unwrap();

        assert!(store.contains("0xaaa"));
        assert!(store.path().is_none());
    }
}
