//! File discovery, change observation, and incremental indexing.
//!
//! This module provides:
//! - The marker tag scanner
//! - Gitignore-aware discovery and filtering
//! - Change events from notify-rs or an embedding editor
//! - The debounced scan scheduler that owns the index

mod events;
mod filter;
mod handler;
mod scanner;
mod scheduler;
pub mod tags;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::FileEvent;
pub use filter::{FileFilter, DEFAULT_EXCLUDED_DIRS};
pub use handler::{EventHandler, WatcherStats, WatcherStatsSnapshot};
pub use scanner::{Discovery, DiscoveryConfig, DiscoveryStats};
pub use scheduler::{
    Scheduler, SchedulerConfig, SchedulerState, SchedulerStatsSnapshot, StartupReport,
};
pub use watcher::FileWatcher;
