//! tagindex - marker comment index
//!
//! Entry point for the command-line indexer.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tagindex::metrics::init_metrics;
use tagindex::observability::{init_tracing, TracingConfig};
use tagindex::storage::{init_storage, Database, IndexCache, IndexStore};
use tagindex::tree::{build_tree, render};
use tagindex::watcher::{Discovery, EventHandler, FileWatcher, Scheduler, WatcherStats};
use tagindex::{Config, Error, Result};

/// tagindex - index TODO/FIXME/BUG/HACK/XXX markers in a source tree
#[derive(Parser, Debug)]
#[command(name = "tagindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root to index
    #[arg(short, long, env = "TAGINDEX_ROOT", default_value = ".")]
    root: PathBuf,

    /// Data directory for the `SQLite` cache
    #[arg(short, long, env = "TAGINDEX_DATA_DIR", default_value = "./.tagindex")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TAGINDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TAGINDEX_LOG_JSON")]
    log_json: bool,

    /// Print the tree as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Keep following file changes until interrupted
    #[arg(short, long, env = "TAGINDEX_WATCH")]
    watch: bool,

    /// Discard the cached index and rebuild it
    #[arg(long)]
    rescan: bool,

    /// Quiet interval before changed files are scanned, in milliseconds
    #[arg(long, env = "TAGINDEX_DEBOUNCE_MS", default_value = "300")]
    debounce_ms: u64,

    /// Maximum number of files scanned at once
    #[arg(long, env = "TAGINDEX_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Files larger than this many bytes are skipped
    #[arg(long, env = "TAGINDEX_MAX_FILE_SIZE", default_value = "1048576")]
    max_file_size: u64,

    /// Upper bound on files discovered
    #[arg(long, env = "TAGINDEX_MAX_FILES", default_value = "100000")]
    max_files: usize,

    /// Additional directory names to exclude
    #[arg(long = "exclude-dir", env = "TAGINDEX_EXCLUDE_DIRS", value_delimiter = ',')]
    exclude_dirs: Vec<String>,

    /// Do not honor .gitignore files
    #[arg(long)]
    no_gitignore: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            root: self.root,
            data_dir: self.data_dir,
            log_level: self.log_level,
            debounce_ms: self.debounce_ms,
            max_concurrency: self.max_concurrency.unwrap_or(defaults.max_concurrency),
            max_file_size: self.max_file_size,
            max_files: self.max_files,
            exclude_dirs: self.exclude_dirs,
            respect_gitignore: !self.no_gitignore,
            watch: self.watch,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    tracing::info!("tagindex v{} starting...", env!("CARGO_PKG_VERSION"));

    let json_output = cli.json;
    let rescan = cli.rescan;
    let config = cli.into_config();

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    init_metrics();

    let db = Database::open(config.database_path())?;
    init_storage(&db)?;
    let cache = IndexCache::new(Arc::new(db));

    let discovery = Discovery::new(config.discovery_config());
    let root = discovery
        .root()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::config("no project root configured"))?;

    let scheduler = Scheduler::new(
        config.scheduler_config(),
        Arc::new(IndexStore::new()),
        cache,
        discovery,
    );

    let report = scheduler.start().await;
    if rescan {
        scheduler.rescan().await;
    }
    scheduler.wait_idle().await;

    let snapshot = scheduler.snapshot();
    tracing::info!(
        files = snapshot.len(),
        occurrences = snapshot.total_occurrences(),
        from_cache = report.cached,
        "Index ready"
    );
    print_tree(&scheduler, &root, json_output)?;

    if config.watch {
        follow_changes(&scheduler, &root, json_output).await;
    }

    scheduler.shutdown().await;
    Ok(())
}

fn print_tree(scheduler: &Scheduler, root: &Path, json: bool) -> Result<()> {
    let tree = build_tree(&scheduler.snapshot(), root);
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{}", render(&tree));
    }
    Ok(())
}

/// Forward filesystem events until Ctrl-C, reprinting the tree on change.
///
/// Watcher setup failures are logged and end watch mode; the index built so
/// far is still flushed by the caller.
async fn follow_changes(scheduler: &Scheduler, root: &Path, json: bool) {
    let mut watcher = match FileWatcher::new() {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create file watcher");
            return;
        }
    };
    if let Err(e) = watcher.watch(root) {
        tracing::warn!(error = %e, "Failed to watch project root");
        return;
    }

    let handler = EventHandler::new(scheduler.clone(), WatcherStats::new());
    let mut changes = scheduler.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            events = watcher.recv() => match events {
                Ok(events) => handler.handle_all(events),
                Err(e) => {
                    tracing::warn!(error = %e, "File watcher stopped");
                    break;
                }
            },
            Ok(()) = changes.changed() => {
                if let Err(e) = print_tree(scheduler, root, json) {
                    tracing::warn!(error = %e, "Failed to print tree");
                }
            }
        }
    }

    let stats = handler.stats().snapshot();
    tracing::info!(
        received = stats.events_received,
        forwarded = stats.events_forwarded,
        filtered = stats.events_filtered,
        "Watch mode ended"
    );
}
