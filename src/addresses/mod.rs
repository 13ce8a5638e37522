//! Address list file, notified-set and the in-memory view built from them.

mod file;
mod notified;

pub use file::{parse_addresses, AddressFile, RemovalOutcome};
pub use notified::NotifiedStore;

use std::collections::HashSet;

use crate::config::NotifierConfig;
use crate::error::Result;

/// Known addresses plus the addresses already surfaced to the chat.
///
/// Shared by the notification producer and the command handlers behind one
/// async mutex.
#[derive(Debug, Default)]
pub struct AddressBook {
    known: HashSet<String>,
    notified: NotifiedStore,
}

impl AddressBook {
    pub fn new(known: impl IntoIterator<Item = String>, notified: NotifiedStore) -> Self {
        Self {
            known: known.into_iter().collect(),
            notified,
        }
    }

    /// Build the startup view.
    ///
    /// With a persisted notified-set the known set starts empty, so entries
    /// added while the relay was down are announced unless already recorded.
    /// Without persistence the current file contents are the baseline.
    pub async fn initialize(file: &AddressFile, config: &NotifierConfig) -> Self {
        if config.persist_notified {
            let notified = NotifiedStore::load(&config.notified_file).await;
            return Self::new(Vec::new(), notified);
        }

        let baseline = file.load().await.unwrap_or_else(|e| {
            tracing::warn!(
                path = %file.path().display(),
                error = %e,
                "Failed to read address file for baseline"
            );
            Vec::new()
        });
        tracing::info!(count = baseline.len(), "Address baseline loaded");
        Self::new(baseline, NotifiedStore::in_memory())
    }

    /// Entries of `current` that are neither known nor already notified,
    /// in file order.
    pub fn new_addresses(&self, current: &[String]) -> Vec<String> {
        current
            .iter()
            .filter(|address| !self.known.contains(*address) && !self.notified.contains(address))
            .cloned()
            .collect()
    }

    pub fn replace_known(&mut self, current: Vec<String>) {
        self.known = current.into_iter().collect();
    }

    pub fn is_known(&self, address: &str) -> bool {
        self.known.contains(address)
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    pub fn notified(&self) -> &NotifiedStore {
        &self.notified
    }

    pub async fn record_notified(&mut self, addresses: &[String]) -> Result<()> {
        self.notified.record(addresses).await
    }

    /// Drop an address from both sets after an explicit removal.
    pub async fn forget(&mut self, address: &str) -> Result<()> {
        self.known.remove(address);
        self.notified.forget(address).await?;
        Ok(())
    }
}
