//! Configuration settings and validation.

use crate::watcher::{DiscoveryConfig, SchedulerConfig};
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for tagindex.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root to index.
    pub root: PathBuf,

    /// Directory for the `SQLite` cache database.
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Quiet interval before pending scans are drained, in milliseconds.
    pub debounce_ms: u64,

    /// Maximum number of files scanned concurrently.
    pub max_concurrency: usize,

    /// Files larger than this many bytes are never read.
    pub max_file_size: u64,

    /// Upper bound on files returned by discovery.
    pub max_files: usize,

    /// Directory names excluded in addition to the built-in list.
    pub exclude_dirs: Vec<String>,

    /// Honor `.gitignore` files during discovery.
    pub respect_gitignore: bool,

    /// Keep following filesystem changes after the initial pass.
    pub watch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_dir: PathBuf::from("./.tagindex"),
            log_level: "info".to_string(),
            debounce_ms: 300,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get().clamp(4, 16))
                .unwrap_or(8),
            max_file_size: 1024 * 1024,
            max_files: 100_000,
            exclude_dirs: Vec::new(),
            respect_gitignore: true,
            watch: false,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.max_concurrency == 0 {
            return Err(Error::config("max_concurrency cannot be 0"));
        }

        if self.max_concurrency > 256 {
            return Err(Error::config(
                "max_concurrency cannot exceed 256 (file descriptor budget)",
            ));
        }

        if self.debounce_ms > 60_000 {
            return Err(Error::config("debounce_ms cannot exceed 60000"));
        }

        if self.max_file_size == 0 {
            return Err(Error::config("max_file_size cannot be 0"));
        }

        if self.max_files == 0 {
            return Err(Error::config("max_files cannot be 0"));
        }

        if self.exclude_dirs.iter().any(|d| d.is_empty() || d.contains('/')) {
            return Err(Error::config(
                "exclude_dirs entries must be bare directory names",
            ));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` cache file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }

    /// Scheduler settings derived from this configuration.
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            max_concurrency: self.max_concurrency,
            max_file_size: self.max_file_size,
            ..SchedulerConfig::default()
        }
    }

    /// Discovery settings derived from this configuration.
    #[must_use]
    pub fn discovery_config(&self) -> DiscoveryConfig {
        let mut exclude_dirs = DiscoveryConfig::default().exclude_dirs;
        exclude_dirs.extend(self.exclude_dirs.iter().cloned());

        // The cache lives inside the project by default.
        if let Some(name) = self.data_dir.file_name().and_then(|n| n.to_str()) {
            if !exclude_dirs.iter().any(|d| d == name) {
                exclude_dirs.push(name.to_string());
            }
        }

        DiscoveryConfig {
            roots: vec![self.root.clone()],
            exclude_dirs,
            max_files: self.max_files,
            respect_gitignore: self.respect_gitignore,
        }
    }
}
