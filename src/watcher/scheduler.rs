//! Incremental scan scheduler.
//!
//! Owns every mutation of the [`IndexStore`]. Work moves through three
//! states:
//!
//! - `Idle`: nothing pending, nothing in flight.
//! - `Debouncing`: tasks are pending and a quiet-period timer is running.
//!   Every enqueue restarts the timer.
//! - `Draining`: the timer fired; up to `max_concurrency` tasks are scanned
//!   in parallel and applied one by one in completion order.
//!
//! After a batch the scheduler returns to `Debouncing` if tasks remain,
//! otherwise it goes `Idle`. A dirty index is persisted when the queue
//! empties, and at least every `flush_interval` during a long drain.
//!
//! A created or renamed path that turns out to be a directory is walked with
//! the discovery rules and its files are queued with priority.
//!
//! Deletes bypass the queue and take effect immediately. A scan that was in
//! flight for a deleted path, or that started before a full rescan, has its
//! result discarded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::events::FileEvent;
use super::scanner::Discovery;
use super::tags;
use crate::error::ScanError;
use crate::metrics::{FILES_SCANNED, FILES_SKIPPED, INDEXED_FILES, OCCURRENCES, PENDING_TASKS};
use crate::storage::{FileStamp, IndexCache, IndexSnapshot, IndexStore, Occurrence};

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Quiet interval before pending tasks are drained.
    pub debounce: Duration,
    /// Maximum files scanned at once.
    pub max_concurrency: usize,
    /// Files above this size are skipped.
    pub max_file_size: u64,
    /// Longest time a dirty index waits for persistence while work remains.
    pub flush_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_concurrency: 8,
            max_file_size: 1024 * 1024,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Coordination state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Debouncing,
    Draining,
}

/// A pending unit of work.
#[derive(Debug, Clone)]
pub struct ScanTask {
    /// File to scan.
    pub path: PathBuf,
    /// Jump ahead of routine backlog.
    pub priority: bool,
    /// Editor buffer content to scan instead of reading the file.
    pub content: Option<Arc<str>>,
    /// Walk the path if it turns out to be a directory.
    pub expand: bool,
}

impl ScanTask {
    /// Task that reads the file from disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, priority: bool) -> Self {
        Self {
            path: path.into(),
            priority,
            content: None,
            expand: false,
        }
    }
}

/// Pending tasks, deduplicated by path.
///
/// `order` may hold superseded entries; only the one whose sequence number
/// matches `tasks` is live.
#[derive(Debug, Default)]
struct PendingQueue {
    order: VecDeque<(u64, PathBuf)>,
    tasks: HashMap<PathBuf, (u64, ScanTask)>,
    next_seq: u64,
}

impl PendingQueue {
    fn push(&mut self, task: ScanTask) {
        self.next_seq += 1;
        let seq = self.next_seq;

        match self.tasks.get_mut(&task.path) {
            Some((live_seq, existing)) => {
                let promote = task.priority;
                let priority = existing.priority || task.priority;
                let expand = existing.expand || task.expand;
                *existing = ScanTask {
                    priority,
                    expand,
                    ..task
                };
                if promote {
                    *live_seq = seq;
                    self.order.push_front((seq, existing.path.clone()));
                }
            }
            None => {
                let path = task.path.clone();
                if task.priority {
                    self.order.push_front((seq, path.clone()));
                } else {
                    self.order.push_back((seq, path.clone()));
                }
                self.tasks.insert(path, (seq, task));
            }
        }

        self.compact();
    }

    fn remove(&mut self, path: &Path) -> bool {
        self.tasks.remove(path).is_some()
    }

    fn remove_under(&mut self, dir: &Path) {
        self.tasks.retain(|path, _| !path.starts_with(dir));
    }

    /// Take up to `limit` tasks in order, leaving paths in `active` queued.
    fn take_batch(&mut self, limit: usize, active: &HashSet<PathBuf>) -> Vec<ScanTask> {
        let mut batch = Vec::new();
        let mut held = Vec::new();

        while batch.len() < limit {
            let Some((seq, path)) = self.order.pop_front() else {
                break;
            };
            let live = self.tasks.get(&path).is_some_and(|(s, _)| *s == seq);
            if !live {
                continue;
            }
            if active.contains(&path) {
                held.push((seq, path));
                continue;
            }
            if let Some((_, task)) = self.tasks.remove(&path) {
                batch.push(task);
            }
        }

        for entry in held.into_iter().rev() {
            self.order.push_front(entry);
        }
        batch
    }

    fn clear(&mut self) {
        self.order.clear();
        self.tasks.clear();
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn compact(&mut self) {
        if self.order.len() > 2 * self.tasks.len() + 64 {
            let tasks = &self.tasks;
            self.order
                .retain(|(seq, path)| tasks.get(path).is_some_and(|(s, _)| s == seq));
        }
    }
}

/// Counters for scheduler activity.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub tasks_enqueued: AtomicU64,
    pub tasks_executed: AtomicU64,
    pub files_scanned: AtomicU64,
    pub files_unchanged: AtomicU64,
    pub files_skipped: AtomicU64,
    pub files_removed: AtomicU64,
    pub results_discarded: AtomicU64,
    pub batches: AtomicU64,
}

impl SchedulerStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_unchanged: self.files_unchanged.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            results_discarded: self.results_discarded.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scheduler stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatsSnapshot {
    pub tasks_enqueued: u64,
    pub tasks_executed: u64,
    pub files_scanned: u64,
    pub files_unchanged: u64,
    pub files_skipped: u64,
    pub files_removed: u64,
    pub results_discarded: u64,
    pub batches: u64,
}

/// Summary of the startup sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Files published from the persisted cache.
    pub cached: usize,
    /// Candidate files found by discovery.
    pub discovered: usize,
    /// Files enqueued because their cache entry was stale or missing.
    pub enqueued: usize,
    /// Cached entries dropped because the file is gone.
    pub pruned: usize,
    /// Events received before initialization and replayed afterwards.
    pub replayed: usize,
}

/// Result of scanning one file.
#[derive(Debug)]
enum ScanOutcome {
    /// Fresh occurrences keyed by the stamp taken before reading.
    Updated(Vec<Occurrence>, FileStamp),
    /// Metadata matches the stored entry.
    Unchanged,
    /// File is gone.
    Vanished,
    /// Not scanned; any prior entry is kept.
    Skipped(crate::Error),
    /// Path is a directory whose files should be queued.
    Directory,
}

struct Shared {
    queue: PendingQueue,
    active: HashSet<PathBuf>,
    deleted_while_active: HashSet<PathBuf>,
    epoch: u64,
    /// `Some` until the first discovery pass completes.
    deferred_events: Option<Vec<FileEvent>>,
    dirty: bool,
}

struct Inner {
    config: SchedulerConfig,
    store: Arc<IndexStore>,
    cache: IndexCache,
    discovery: Discovery,
    stats: SchedulerStats,
    shared: Mutex<Shared>,
    wake: Notify,
    state_tx: watch::Sender<SchedulerState>,
    changes_tx: watch::Sender<u64>,
    shutdown: CancellationToken,
    runner: Mutex<Option<JoinHandle<()>>>,
}

/// Drives discovery, debounced rescans, deletes, and persistence.
///
/// Clone is cheap; all clones share one scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler. Nothing runs until [`Scheduler::start`].
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        store: Arc<IndexStore>,
        cache: IndexCache,
        discovery: Discovery,
    ) -> Self {
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        let (changes_tx, _) = watch::channel(store.revision());

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                cache,
                discovery,
                stats: SchedulerStats::default(),
                shared: Mutex::new(Shared {
                    queue: PendingQueue::default(),
                    active: HashSet::new(),
                    deleted_while_active: HashSet::new(),
                    epoch: 0,
                    deferred_events: Some(Vec::new()),
                    dirty: false,
                }),
                wake: Notify::new(),
                state_tx,
                changes_tx,
                shutdown: CancellationToken::new(),
                runner: Mutex::new(None),
            }),
        }
    }

    /// Run the startup sequence.
    ///
    /// Publishes the persisted cache, discovers files, enqueues stale ones,
    /// then marks the scheduler initialized and replays events that arrived
    /// meanwhile. Scanning continues in the background.
    pub async fn start(&self) -> StartupReport {
        self.spawn_runner();

        let cached = self.inner.cache.load().await;
        let mut report = StartupReport {
            cached: cached.len(),
            ..Default::default()
        };
        self.inner.store.replace_all(cached.into_values());
        self.notify_changed();
        tracing::info!(files = report.cached, "Published cached index");

        let (discovered, enqueued, pruned) = self.enqueue_discovered().await;
        report.discovered = discovered;
        report.enqueued = enqueued;
        report.pruned = pruned;

        let deferred = self.inner.shared.lock().deferred_events.take().unwrap_or_default();
        report.replayed = deferred.len();
        for event in deferred {
            self.dispatch(event);
        }

        tracing::info!(
            cached = report.cached,
            discovered = report.discovered,
            enqueued = report.enqueued,
            pruned = report.pruned,
            replayed = report.replayed,
            "Scheduler initialized"
        );
        report
    }

    /// Feed a change event.
    ///
    /// Before initialization completes the event is retained and replayed
    /// afterwards.
    pub fn handle_event(&self, event: FileEvent) {
        {
            let mut shared = self.inner.shared.lock();
            if let Some(deferred) = shared.deferred_events.as_mut() {
                tracing::debug!(path = %event.path().display(), "Deferring event until initialized");
                deferred.push(event);
                return;
            }
        }
        self.dispatch(event);
    }

    fn dispatch(&self, event: FileEvent) {
        match event {
            FileEvent::Created(path) => self.enqueue_created(path),
            FileEvent::Changed(path) => self.enqueue(path, true),
            FileEvent::Saved { path, text } => self.enqueue_saved(path, text),
            FileEvent::Deleted(path) => {
                self.remove(&path);
            }
            FileEvent::Renamed { from, to } => {
                self.remove(&from);
                self.enqueue_created(to);
            }
            FileEvent::ActiveChanged(_) => {}
        }
    }

    /// Queue `path` for scanning.
    pub fn enqueue(&self, path: impl Into<PathBuf>, priority: bool) {
        self.push_tasks(std::iter::once(ScanTask::new(path, priority)));
    }

    /// Queue a path that just appeared. Directories are walked.
    fn enqueue_created(&self, path: PathBuf) {
        self.push_tasks(std::iter::once(ScanTask {
            expand: true,
            ..ScanTask::new(path, true)
        }));
    }

    /// Queue a scan of an editor buffer that was just saved.
    pub fn enqueue_saved(&self, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) {
        self.push_tasks(std::iter::once(ScanTask {
            content: Some(text.into()),
            ..ScanTask::new(path, true)
        }));
    }

    fn push_tasks(&self, tasks: impl IntoIterator<Item = ScanTask>) {
        let mut count = 0u64;
        {
            let mut shared = self.inner.shared.lock();
            for task in tasks {
                shared.queue.push(task);
                count += 1;
            }
            if count == 0 {
                return;
            }
            PENDING_TASKS.set(i64::try_from(shared.queue.len()).unwrap_or(i64::MAX));
            self.begin_debounce();
        }
        self.inner
            .stats
            .tasks_enqueued
            .fetch_add(count, Ordering::Relaxed);
        self.inner.wake.notify_one();
    }

    /// Remove `path` from the index immediately.
    ///
    /// Pending scans for the path are dropped and an in-flight scan has its
    /// result discarded. A directory path removes everything below it.
    /// Returns `true` if the index changed.
    pub fn remove(&self, path: &Path) -> bool {
        let changed = {
            let mut shared = self.inner.shared.lock();
            shared.queue.remove(path);
            shared.queue.remove_under(path);
            let in_flight: Vec<PathBuf> = shared
                .active
                .iter()
                .filter(|p| p.starts_with(path))
                .cloned()
                .collect();
            shared.deleted_while_active.extend(in_flight);

            let changed = self.inner.store.remove(path) || self.inner.store.remove_under(path) > 0;
            if changed {
                shared.dirty = true;
                // Let the runner persist once things are quiet.
                self.begin_debounce();
            }
            changed
        };

        if changed {
            self.inner.stats.files_removed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %path.display(), "Removed from index");
            self.notify_changed();
            self.inner.wake.notify_one();
        }
        changed
    }

    /// Discard the whole index and rebuild it from discovery.
    ///
    /// Scans already in flight complete but their results are dropped.
    pub async fn rescan(&self) {
        tracing::info!("Full rescan requested");
        {
            let mut shared = self.inner.shared.lock();
            shared.epoch += 1;
            shared.queue.clear();
            shared.active.clear();
            shared.deleted_while_active.clear();
            shared.dirty = true;
            self.inner.store.clear();
        }
        self.notify_changed();

        let (discovered, enqueued, _) = self.enqueue_discovered().await;
        tracing::info!(discovered, enqueued, "Rescan queued");

        // Persist the cleared index even if nothing needs scanning.
        {
            let shared = self.inner.shared.lock();
            if shared.queue.is_empty() {
                self.begin_debounce();
            }
        }
        self.inner.wake.notify_one();
    }

    /// Stop the runner and flush the index. Save failures are swallowed.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let runner = self.inner.runner.lock().take();
        if let Some(handle) = runner {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scheduler runner ended abnormally");
            }
        }

        let snapshot = self.inner.store.snapshot();
        if self.inner.cache.save(&snapshot).await {
            self.inner.shared.lock().dirty = false;
        }
        self.inner.state_tx.send_replace(SchedulerState::Idle);
        tracing::info!("Scheduler stopped");
    }

    /// Current coordination state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.inner.state_tx.borrow()
    }

    /// Wait until no work is pending or in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|s| *s == SchedulerState::Idle).await;
    }

    /// Receive a notification after every index mutation.
    ///
    /// The value is the store revision; consumers re-pull via `snapshot()`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes_tx.subscribe()
    }

    /// Immutable view of the index.
    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        self.inner.store.snapshot()
    }

    /// Shared handle to the store.
    #[must_use]
    pub fn store(&self) -> Arc<IndexStore> {
        Arc::clone(&self.inner.store)
    }

    /// Discovery used by this scheduler.
    #[must_use]
    pub fn discovery(&self) -> &Discovery {
        &self.inner.discovery
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.shared.lock().queue.len()
    }

    /// Whether the first discovery pass has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.shared.lock().deferred_events.is_none()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Move `Idle` to `Debouncing`. Caller holds the shared lock.
    fn begin_debounce(&self) {
        self.inner.state_tx.send_if_modified(|state| {
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Debouncing;
                true
            } else {
                false
            }
        });
    }

    fn notify_changed(&self) {
        let snapshot = self.inner.store.snapshot();
        INDEXED_FILES.set(i64::try_from(snapshot.len()).unwrap_or(i64::MAX));
        OCCURRENCES.set(i64::try_from(snapshot.total_occurrences()).unwrap_or(i64::MAX));
        self.inner.changes_tx.send_replace(snapshot.revision());
    }

    fn spawn_runner(&self) {
        let mut runner = self.inner.runner.lock();
        if runner.is_none() {
            let this = self.clone();
            *runner = Some(tokio::spawn(async move { this.run().await }));
        }
    }

    async fn run(self) {
        tracing::debug!("Scheduler runner started");
        let shutdown = self.inner.shutdown.clone();
        let mut last_flush = Instant::now();

        'outer: loop {
            if self.state() == SchedulerState::Idle {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = self.inner.wake.notified() => {}
                }
            }

            // Debouncing: restart the quiet period on every wake.
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break 'outer,
                    () = self.inner.wake.notified() => {}
                    () = tokio::time::sleep(self.inner.config.debounce) => break,
                }
            }

            self.drain_batch().await;

            let persist = {
                let mut shared = self.inner.shared.lock();
                let due = shared.queue.is_empty()
                    || last_flush.elapsed() >= self.inner.config.flush_interval;
                if shared.dirty && due {
                    shared.dirty = false;
                    true
                } else {
                    false
                }
            };
            if persist {
                last_flush = Instant::now();
                if !self.inner.cache.save(&self.inner.store.snapshot()).await {
                    self.inner.shared.lock().dirty = true;
                }
            }

            let shared = self.inner.shared.lock();
            let next = if shared.queue.is_empty() {
                SchedulerState::Idle
            } else {
                SchedulerState::Debouncing
            };
            self.inner.state_tx.send_replace(next);
        }

        tracing::debug!("Scheduler runner stopped");
    }

    async fn drain_batch(&self) {
        let (batch, epoch) = {
            let mut shared = self.inner.shared.lock();
            let Shared { queue, active, .. } = &mut *shared;
            let batch = queue.take_batch(self.inner.config.max_concurrency, active);
            if batch.is_empty() {
                return;
            }
            active.extend(batch.iter().map(|t| t.path.clone()));
            PENDING_TASKS.set(i64::try_from(queue.len()).unwrap_or(i64::MAX));
            self.inner.state_tx.send_replace(SchedulerState::Draining);
            (batch, shared.epoch)
        };

        self.inner.stats.batches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(files = batch.len(), "Draining scan batch");

        let mut results = stream::iter(batch)
            .map(|task| {
                let inner = Arc::clone(&self.inner);
                async move {
                    let outcome = inner.scan(&task).await;
                    (task.path, outcome)
                }
            })
            .buffer_unordered(self.inner.config.max_concurrency);

        let mut changed = false;
        let mut dirs = Vec::new();
        while let Some((path, outcome)) = results.next().await {
            if matches!(outcome, ScanOutcome::Directory) {
                let mut shared = self.inner.shared.lock();
                if self.release(&mut shared, &path, epoch) {
                    dirs.push(path);
                }
            } else {
                changed |= self.apply_outcome(&path, outcome, epoch);
            }
        }

        if changed {
            self.notify_changed();
        }
        for dir in dirs {
            self.expand_directory(dir, epoch).await;
        }
    }

    /// Finish an in-flight task. Returns `false` if its result is superseded
    /// by a delete or a rescan.
    fn release(&self, shared: &mut Shared, path: &Path, epoch: u64) -> bool {
        shared.active.remove(path);
        let deleted = shared.deleted_while_active.remove(path);

        if deleted || epoch != shared.epoch {
            self.inner
                .stats
                .results_discarded
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %path.display(), "Discarding superseded scan result");
            return false;
        }
        true
    }

    /// Apply one scan result. Serialized with deletes through the lock.
    fn apply_outcome(&self, path: &Path, outcome: ScanOutcome, epoch: u64) -> bool {
        let mut shared = self.inner.shared.lock();
        if !self.release(&mut shared, path, epoch) {
            return false;
        }

        let changed = match outcome {
            ScanOutcome::Updated(occurrences, stamp) => {
                self.inner.store.apply(path, occurrences, stamp)
            }
            ScanOutcome::Vanished => self.inner.store.remove(path),
            ScanOutcome::Unchanged | ScanOutcome::Directory => false,
            ScanOutcome::Skipped(reason) => {
                tracing::debug!(path = %path.display(), reason = %reason, "Skipped file");
                false
            }
        };

        if changed {
            shared.dirty = true;
        }
        changed
    }

    /// Queue every candidate file below `dir` with priority.
    async fn expand_directory(&self, dir: PathBuf, epoch: u64) {
        let discovery = self.inner.discovery.clone();
        let walked = dir.clone();
        let files = tokio::task::spawn_blocking(move || discovery.discover_under(&walked))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Directory walk failed");
                Vec::new()
            });

        if self.inner.shared.lock().epoch != epoch {
            return;
        }
        tracing::debug!(path = %dir.display(), files = files.len(), "Queueing files of new directory");
        self.push_tasks(files.into_iter().map(|p| ScanTask::new(p, true)));
    }

    /// Drop cached entries for files that no longer exist, in one mutation.
    fn prune(&self, gone: &[PathBuf]) -> usize {
        let pruned = {
            let mut shared = self.inner.shared.lock();
            for path in gone {
                shared.queue.remove(path);
                if shared.active.contains(path) {
                    shared.deleted_while_active.insert(path.clone());
                }
            }
            let pruned = self.inner.store.remove_many(gone);
            if pruned > 0 {
                shared.dirty = true;
                self.begin_debounce();
            }
            pruned
        };

        if pruned > 0 {
            self.inner
                .stats
                .files_removed
                .fetch_add(u64::try_from(pruned).unwrap_or(u64::MAX), Ordering::Relaxed);
            tracing::debug!(files = pruned, "Pruned vanished files");
            self.notify_changed();
            self.inner.wake.notify_one();
        }
        pruned
    }

    /// Discover files, prune vanished cache entries, and enqueue stale files.
    ///
    /// Returns `(discovered, enqueued, pruned)`.
    async fn enqueue_discovered(&self) -> (usize, usize, usize) {
        let epoch = self.inner.shared.lock().epoch;

        let discovery = self.inner.discovery.clone();
        let (paths, stats) = tokio::task::spawn_blocking(move || discovery.discover_with_stats())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discovery task failed");
                (Vec::new(), super::scanner::DiscoveryStats::default())
            });

        let mut pruned = 0;
        if !stats.truncated {
            let known: HashSet<&PathBuf> = paths.iter().collect();
            let gone: Vec<PathBuf> = self
                .inner
                .store
                .snapshot()
                .iter()
                .filter(|e| !known.contains(&e.path))
                .map(|e| e.path.clone())
                .collect();
            pruned = self.prune(&gone);
        }

        let store = Arc::clone(&self.inner.store);
        let stale: Vec<PathBuf> = stream::iter(paths.iter().cloned())
            .map(|path| {
                let store = Arc::clone(&store);
                async move {
                    match tokio::fs::metadata(&path).await {
                        Ok(meta) if meta.is_file() => {
                            let stamp = FileStamp::from_metadata(&meta);
                            store
                                .is_stale(&path, stamp.modified_at, stamp.size)
                                .then_some(path)
                        }
                        _ => None,
                    }
                }
            })
            .buffered(self.inner.config.max_concurrency * 4)
            .filter_map(std::future::ready)
            .collect()
            .await;

        if self.inner.shared.lock().epoch != epoch {
            tracing::debug!("Rescan started during discovery, dropping results");
            return (paths.len(), 0, pruned);
        }

        let enqueued = stale.len();
        self.push_tasks(stale.into_iter().map(|p| ScanTask::new(p, false)));
        (paths.len(), enqueued, pruned)
    }
}

impl Inner {
    async fn scan(&self, task: &ScanTask) -> ScanOutcome {
        self.stats.tasks_executed.fetch_add(1, Ordering::Relaxed);
        let outcome = self.scan_file(task).await;

        match &outcome {
            ScanOutcome::Updated(..) => {
                FILES_SCANNED.inc();
                self.stats.files_scanned.fetch_add(1, Ordering::Relaxed);
            }
            ScanOutcome::Unchanged => {
                self.stats.files_unchanged.fetch_add(1, Ordering::Relaxed);
            }
            ScanOutcome::Skipped(_) => {
                FILES_SKIPPED.inc();
                self.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
            }
            ScanOutcome::Vanished | ScanOutcome::Directory => {}
        }
        outcome
    }

    async fn scan_file(&self, task: &ScanTask) -> ScanOutcome {
        let path = &task.path;

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ScanOutcome::Vanished,
            Err(e) => return ScanOutcome::Skipped(e.into()),
        };
        if metadata.is_dir() && task.expand {
            return ScanOutcome::Directory;
        }
        if !metadata.is_file() {
            return ScanOutcome::Skipped(crate::Error::internal("not a regular file"));
        }
        let stamp = FileStamp::from_metadata(&metadata);

        if let Some(text) = &task.content {
            return ScanOutcome::Updated(tags::scan(text), stamp);
        }

        if !self.store.is_stale(path, stamp.modified_at, stamp.size) {
            return ScanOutcome::Unchanged;
        }

        let limit = self.config.max_file_size;
        if metadata.len() > limit {
            return ScanOutcome::Skipped(
                ScanError::TooLarge {
                    size: metadata.len(),
                    limit,
                }
                .into(),
            );
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ScanOutcome::Vanished,
            Err(e) => return ScanOutcome::Skipped(e.into()),
        };

        match tags::scan_bytes(&bytes) {
            Ok(occurrences) => ScanOutcome::Updated(occurrences, stamp),
            Err(e) => ScanOutcome::Skipped(e.into()),
        }
    }
}
