//! Configuration file watcher for hot reload.
//!
//! Watches the parent directory of every backing file rather than the files
//! themselves, so editors that save by writing a new file and renaming it
//! over the old one keep being observed. Events are filtered down to the
//! watched paths and forwarded as bare change signals; the reload task
//! decides what to do with them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::error::ConfigError;

/// A running watch over a fixed set of files.
///
/// Dropping it (or calling [`ConfigFileWatcher::stop`]) releases the OS
/// watch resources.
pub struct ConfigFileWatcher {
    watcher: RecommendedWatcher,
    files: Vec<PathBuf>,
}

impl std::fmt::Debug for ConfigFileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFileWatcher")
            .field("files", &self.files)
            .finish()
    }
}

impl ConfigFileWatcher {
    /// Start watching `files`; every relevant change sends one `()` on
    /// `changes`. Never blocks on the receiver.
    pub fn start<'p>(
        files: impl IntoIterator<Item = &'p Path>,
        changes: mpsc::UnboundedSender<()>,
    ) -> Result<Self, ConfigError> {
        let files: Vec<PathBuf> = files.into_iter().map(normalize).collect();
        let filter = files.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event, &filter) {
                        tracing::debug!(paths = ?event.paths, kind = ?event.kind, "Config file change detected");
                        let _ = changes.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;

        let dirs: BTreeSet<&Path> = files.iter().filter_map(|f| f.parent()).collect();
        for dir in dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(files = ?files, "Config watcher started");
        Ok(Self { watcher, files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Stop watching and release OS resources.
    pub fn stop(mut self) {
        let dirs: BTreeSet<PathBuf> = self
            .files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();
        for dir in dirs {
            if let Err(e) = self.watcher.unwatch(&dir) {
                tracing::debug!(dir = %dir.display(), "Unwatch failed: {}", e);
            }
        }
        tracing::info!("Config watcher stopped");
    }
}

fn is_relevant(event: &Event, files: &[PathBuf]) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| files.contains(&normalize(p)))
}

/// Canonicalize the directory part of a path. The file itself may not exist
/// (removed, or mid-rename), so it is not canonicalized.
fn normalize(path: &Path) -> PathBuf {
    let absolute = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.canonicalize().ok().map(|p| match path.file_name() {
            Some(name) => p.join(name),
            None => p,
        }),
        _ => std::env::current_dir().ok().and_then(|cwd| cwd.canonicalize().ok()).map(|cwd| cwd.join(path)),
    };
    absolute.unwrap_or_else(|| path.to_path_buf())
}
