//! Address file change detection.

mod debounce;

pub use debounce::Debouncer;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};

/// Whether a filesystem event concerns the watched file
pub fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

/// Watches the directory containing the address file.
///
/// Editors that save by rename replace the inode, so the parent directory is
/// watched and events are filtered by file name. Raw events are forwarded
/// undebounced; the watch stops when this value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl FileWatcher {
    pub fn start(path: &Path, raw_tx: mpsc::UnboundedSender<()>) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                AppError::Validation(format!("address file has no file name: {}", path.display()))
            })?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event, &file_name) {
                    let _ = raw_tx.send(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        })?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(
            path = %path.display(),
            directory = %directory.display(),
            "Watching address file"
        );

        Ok(Self {
            _watcher: watcher,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
