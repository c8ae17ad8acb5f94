//! File watcher for hot reloading scene files
//!
//! Watches JSON scene files and reports when they should be reloaded.

use anyhow::{Result, anyhow};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

/// Event emitted when a watched file changes
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A watched file was written, created or replaced
    Modified(PathBuf),
    /// An error occurred while watching
    Error(String),
}

fn is_scene_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

/// Watches scene files for changes
pub struct SceneWatcher {
    debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<WatchEvent>,
    watched_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl SceneWatcher {
    /// Create a new scene watcher
    ///
    /// `debounce_ms` defaults to 100.
    pub fn new(debounce_ms: Option<u64>) -> Result<Self> {
        let (tx, rx) = channel();
        let watched_paths = Arc::new(Mutex::new(Vec::<PathBuf>::new()));
        let watched_paths_clone = watched_paths.clone();

        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(100));

        let debouncer = new_debouncer(
            debounce_duration,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let watched = watched_paths_clone.lock();
                    for event in events {
                        let path = event.path;
                        let is_exact = watched.contains(&path);
                        let in_watched_dir = watched.iter().any(|p| path.starts_with(p));

                        if is_exact || (in_watched_dir && is_scene_file(&path)) {
                            // All debounced events are treated as modifications
                            let _ = tx.send(WatchEvent::Modified(path));
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(format!("Watch error: {e:?}")));
                }
            },
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {e:?}"))?;

        Ok(Self {
            debouncer,
            receiver: rx,
            watched_paths,
        })
    }

    /// Watch a file or directory for changes
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());

        {
            let mut watched = self.watched_paths.lock();
            if !watched.contains(&canonical) {
                watched.push(canonical.clone());
            }
        }

        self.debouncer
            .watcher()
            .watch(&canonical, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {}: {}", canonical.display(), e))?;

        tracing::info!("Watching: {}", canonical.display());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        self.watched_paths.lock().retain(|p| p != &canonical);

        self.debouncer
            .watcher()
            .unwatch(&canonical)
            .map_err(|e| anyhow!("Failed to unwatch path {}: {}", canonical.display(), e))?;

        Ok(())
    }

    /// Paths currently being watched
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.lock().clone()
    }

    /// Drain pending events, returning `true` if any path was modified
    pub fn take_modified(&self) -> bool {
        let mut modified = false;
        for event in self.receiver.try_iter() {
            match event {
                WatchEvent::Modified(_) => modified = true,
                WatchEvent::Error(e) => tracing::warn!("{e}"),
            }
        }
        modified
    }
}
