//! Change event handler.
//!
//! Sits between event sources (the filesystem watcher or an embedding
//! editor) and the scheduler. Non-candidate paths are dropped here; deletes
//! always pass through so stale entries can be removed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::events::FileEvent;
use super::filter::FileFilter;
use super::scheduler::Scheduler;
use crate::storage::Occurrence;

/// Statistics for event handling.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub events_received: AtomicU64,
    pub events_filtered: AtomicU64,
    pub events_forwarded: AtomicU64,
    pub deletes_forwarded: AtomicU64,
}

impl WatcherStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            deletes_forwarded: self.deletes_forwarded.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of handler stats.
#[derive(Debug, Clone, Copy)]
pub struct WatcherStatsSnapshot {
    pub events_received: u64,
    pub events_filtered: u64,
    pub events_forwarded: u64,
    pub deletes_forwarded: u64,
}

/// Filters change events and forwards them to the scheduler.
pub struct EventHandler {
    filter: Arc<FileFilter>,
    scheduler: Scheduler,
    stats: Arc<WatcherStats>,
    active: Mutex<Option<PathBuf>>,
}

impl EventHandler {
    /// Create a handler using the scheduler's discovery filter.
    #[must_use]
    pub fn new(scheduler: Scheduler, stats: Arc<WatcherStats>) -> Self {
        Self {
            filter: scheduler.discovery().filter(),
            scheduler,
            stats,
            active: Mutex::new(None),
        }
    }

    /// Process one event.
    pub fn handle(&self, event: FileEvent) {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);

        let forward = match event {
            FileEvent::ActiveChanged(path) => {
                tracing::trace!(path = %path.display(), "Active document changed");
                *self.active.lock() = Some(path);
                return;
            }
            FileEvent::Deleted(path) => {
                self.stats.deletes_forwarded.fetch_add(1, Ordering::Relaxed);
                Some(FileEvent::Deleted(path))
            }
            FileEvent::Renamed { from, to } => {
                if self.filter.is_candidate(&to) {
                    Some(FileEvent::Renamed { from, to })
                } else {
                    // Moved out of scope: only the removal matters.
                    self.stats.deletes_forwarded.fetch_add(1, Ordering::Relaxed);
                    Some(FileEvent::Deleted(from))
                }
            }
            event @ (FileEvent::Created(_) | FileEvent::Changed(_) | FileEvent::Saved { .. }) => {
                self.filter.is_candidate(event.path()).then_some(event)
            }
        };

        match forward {
            Some(event) => {
                self.stats.events_forwarded.fetch_add(1, Ordering::Relaxed);
                self.scheduler.handle_event(event);
            }
            None => {
                self.stats.events_filtered.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Process a batch of events in order.
    pub fn handle_all(&self, events: impl IntoIterator<Item = FileEvent>) {
        for event in events {
            self.handle(event);
        }
    }

    /// Document most recently reported active.
    #[must_use]
    pub fn active(&self) -> Option<PathBuf> {
        self.active.lock().clone()
    }

    /// Occurrences of the active document, for highlighting.
    #[must_use]
    pub fn highlights(&self) -> Vec<Occurrence> {
        let active = self.active.lock();
        active
            .as_deref()
            .map(|path| self.occurrences_for(path))
            .unwrap_or_default()
    }

    fn occurrences_for(&self, path: &Path) -> Vec<Occurrence> {
        self.scheduler
            .snapshot()
            .get(path)
            .map(<[Occurrence]>::to_vec)
            .unwrap_or_default()
    }

    /// Get current stats.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStamp, IndexCache, IndexStore, MemoryStore, Tag};
    use crate::watcher::{Discovery, DiscoveryConfig, SchedulerConfig};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn handler_for(root: &Path) -> EventHandler {
        let discovery = Discovery::new(DiscoveryConfig {
            roots: vec![root.to_path_buf()],
            ..Default::default()
        });
        let scheduler = Scheduler::new(
            SchedulerConfig {
                debounce: Duration::from_millis(10),
                ..Default::default()
            },
            Arc::new(IndexStore::new()),
            IndexCache::new(Arc::new(MemoryStore::new())),
            discovery,
        );
        scheduler.start().await;
        EventHandler::new(scheduler, WatcherStats::new())
    }

    #[tokio::test]
    async fn test_handler_filters_files() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_for(tmp.path()).await;

        handler.handle(FileEvent::Changed(tmp.path().join("main.rs")));
        handler.handle(FileEvent::Changed(tmp.path().join("image.png")));
        handler.handle(FileEvent::Created(
            tmp.path().join("node_modules").join("x.js"),
        ));

        assert_eq!(handler.scheduler.pending_len(), 1);
        let snapshot = handler.stats().snapshot();
        assert_eq!(snapshot.events_received, 3);
        assert_eq!(snapshot.events_forwarded, 1);
        assert_eq!(snapshot.events_filtered, 2);
        handler.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_always_forwards_deletes() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_for(tmp.path()).await;
        let store = handler.scheduler.store();
        let ignored = tmp.path().join("old.png");
        store.apply(
            &ignored,
            vec![Occurrence::new(Tag::Todo, "x", 0, 0)],
            FileStamp::new(1, None),
        );

        handler.handle(FileEvent::Deleted(ignored.clone()));

        assert!(!store.snapshot().contains(&ignored));
        assert_eq!(handler.stats().snapshot().deletes_forwarded, 1);
        handler.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_rename_out_of_scope_becomes_delete() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_for(tmp.path()).await;
        let store = handler.scheduler.store();
        let from = tmp.path().join("a.rs");
        store.apply(
            &from,
            vec![Occurrence::new(Tag::Hack, "x", 0, 0)],
            FileStamp::new(1, None),
        );

        handler.handle(FileEvent::Renamed {
            from: from.clone(),
            to: tmp.path().join("a.png"),
        });

        assert!(!store.snapshot().contains(&from));
        assert_eq!(handler.scheduler.pending_len(), 0);
        handler.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_highlights_follow_active_document() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_for(tmp.path()).await;
        let path = tmp.path().join("a.rs");
        let occ = Occurrence::new(Tag::Fixme, "null check", 2, 3);
        handler
            .scheduler
            .store()
            .apply(&path, vec![occ.clone()], FileStamp::new(1, None));

        assert!(handler.highlights().is_empty());

        let revision = handler.scheduler.store().revision();
        handler.handle(FileEvent::ActiveChanged(path.clone()));
        assert_eq!(handler.active(), Some(path));
        assert_eq!(handler.highlights(), vec![occ]);
        assert_eq!(handler.scheduler.store().revision(), revision);
        assert_eq!(handler.stats().snapshot().events_forwarded, 0);
        handler.scheduler.shutdown().await;
    }
}
