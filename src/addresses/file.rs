use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Result of a removal request against the address file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    NotFound,
}

impl RemovalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalOutcome::Removed => "removed",
            RemovalOutcome::NotFound => "not_found",
        }
    }
}

/// Parse the address list: one entry per line, trimmed, blank lines and
/// `#` comments skipped. Duplicates collapse onto their first occurrence.
pub fn parse_addresses(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .filter_map(entry)
        .filter(|address| seen.insert(*address))
        .map(str::to_string)
        .collect()
}

fn entry(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        None
    } else {
        Some(trimmed)
    }
}

/// Flat text file holding the watched wallet addresses
#[derive(Debug, Clone)]
pub struct AddressFile {
    path: PathBuf,
}

impl AddressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full list. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(parse_addresses(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Address file does not exist yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the file without any line holding `address`. Comments and
    /// other entries are kept as they are.
    pub async fn remove(&self, address: &str) -> Result<RemovalOutcome> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RemovalOutcome::NotFound),
            Err(e) => return Err(e.into()),
        };

        let mut removed = false;
        let kept: Vec<&str> = content
            .lines()
            .filter(|line| {
                let matches = entry(line) == Some(address);
                removed |= matches;
                !matches
            })
            .collect();

        if !removed {
            return Ok(RemovalOutcome::NotFound);
        }

        let mut rewritten = kept.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        tokio::fs::write(&self.path, rewritten).await?;

        tracing::info!(
            path = %self.path.display(),
            address = %address,
            "Removed address from list"
        );

        Ok(RemovalOutcome::Removed)
    }
}
