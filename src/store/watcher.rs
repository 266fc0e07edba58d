//! Seed file watcher for hot reload of tenant data.
//!
//! Watches the seed file's parent directory and filters events by file name,
//! so saves that rename a new file over the seed keep being picked up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::memory::{MemoryStore, StoreChange};

/// Monitors the store's seed file and reloads it on change.
pub struct StoreWatcher {
    path: PathBuf,
    store: Arc<MemoryStore>,
    change_tx: mpsc::UnboundedSender<StoreChange>,
}

impl StoreWatcher {
    /// Create a watcher for a store that was loaded from a file.
    ///
    /// Returns `None` when the store has no backing file. The receiver yields
    /// the keys touched by every successful reload.
    pub fn new(store: Arc<MemoryStore>) -> Option<(Self, mpsc::UnboundedReceiver<StoreChange>)> {
        let path = store.path()?.to_path_buf();
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        Some((
            Self {
                path,
                store,
                change_tx,
            },
            change_rx,
        ))
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx;
        let store = self.store;
        let file_name: OsString = self
            .path
            .file_name()
            .ok_or_else(|| notify::Error::generic("store path has no file name"))?
            .to_os_string();
        let dir = watch_dir(&self.path);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if !ours {
                        return;
                    }
                    match store.reload() {
                        Ok(change) if change.is_empty() => {
                            tracing::debug!("Store file touched, no tenant data changed");
                        }
                        Ok(change) => {
                            tracing::info!(
                                prefixes = change.prefixes.len(),
                                projects = change.project_ids.len(),
                                "Store reloaded"
                            );
                            let _ = tx.send(change);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload store, keeping current data");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Store watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Store watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
