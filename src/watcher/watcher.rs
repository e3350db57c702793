//! File system watcher using notify-rs.
//!
//! Raw events are forwarded without debouncing; the scheduler owns the quiet
//! period.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::FileEvent;
use crate::error::WatcherError;
use crate::Result;

/// Capacity of the event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// File system watcher.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::Receiver<Vec<FileEvent>>,
    watched_dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FileWatcher {
    /// Create a watcher that is not yet watching anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let watched_dirs = Arc::new(Mutex::new(Vec::new()));
        let watched_dirs_clone = Arc::clone(&watched_dirs);

        let watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    let mut events = FileEvent::from_notify(event);
                    {
                        let dirs = watched_dirs_clone.lock();
                        events.retain(|e| match e {
                            FileEvent::Renamed { from, to } => {
                                is_under_watched(&dirs, from) || is_under_watched(&dirs, to)
                            }
                            other => is_under_watched(&dirs, other.path()),
                        });
                    }
                    if !events.is_empty() && event_tx.blocking_send(events).is_err() {
                        tracing::debug!("Event receiver dropped");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Watch error");
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_dirs,
        })
    }

    /// Add a directory to watch recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be watched.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        if !path.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: path.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        self.watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.watched_dirs.lock().push(path.clone());
        tracing::info!(path = %path.display(), "Watching directory");

        Ok(())
    }

    /// Stop watching a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if unwatching fails.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        self.watcher
            .unwatch(path)
            .map_err(|e| WatcherError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.watched_dirs.lock().retain(|p| p != path);

        tracing::info!(path = %path.display(), "Stopped watching directory");
        Ok(())
    }

    /// Receive the next group of events.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Closed` once the platform watcher is gone.
    pub async fn recv(&mut self) -> Result<Vec<FileEvent>> {
        self.event_rx
            .recv()
            .await
            .ok_or_else(|| WatcherError::Closed.into())
    }

    /// Get list of watched directories.
    #[must_use]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched_dirs.lock().clone()
    }
}

/// Check if a path is under any watched directory.
fn is_under_watched(watched: &[PathBuf], path: &Path) -> bool {
    watched.iter().any(|dir| path.starts_with(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_is_under_watched() {
        let watched = vec![
            PathBuf::from("/home/user/project"),
            PathBuf::from("/var/data"),
        ];

        assert!(is_under_watched(
            &watched,
            Path::new("/home/user/project/src/main.rs")
        ));
        assert!(is_under_watched(&watched, Path::new("/var/data/file.txt")));
        assert!(!is_under_watched(&watched, Path::new("/tmp/other.txt")));
    }

    #[test]
    fn test_watcher_nonexistent_dir() {
        let mut watcher = FileWatcher::new().unwrap();

        let result = watcher.watch("/nonexistent/directory");
        assert!(matches!(
            result,
            Err(crate::Error::Watcher(WatcherError::WatchFailed { .. }))
        ));
    }

    #[test]
    fn test_watcher_watch_and_unwatch() {
        let tmp = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new().unwrap();

        watcher.watch(tmp.path()).unwrap();
        assert_eq!(watcher.watched_dirs().len(), 1);

        watcher.unwatch(tmp.path()).unwrap();
        assert!(watcher.watched_dirs().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_reports_new_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let mut watcher = FileWatcher::new().unwrap();
        watcher.watch(&root).unwrap();

        let file = root.join("new.rs");
        std::fs::write(&file, "// TODO: watch me").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let events = watcher.recv().await.unwrap();
                if events.iter().any(|e| e.path() == file) {
                    break;
                }
            }
        })
        .await;
        assert!(seen.is_ok(), "no event for the new file");
    }
}
